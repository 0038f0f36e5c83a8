use std::fmt;
use std::marker::PhantomData;

/// Whether the caller waits for a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    /// Expects a response
    Call,
    /// Fire-and-forget, no response frame is ever sent
    Notify,
}

/// Split `"keybase.1.loginUi.getEmailOrUsername"` into protocol and method
///
/// The method is everything after the last dot.
pub fn split_qualified(name: &str) -> Option<(&str, &str)> {
    match name.rsplit_once('.') {
        Some((protocol, method)) if !protocol.is_empty() && !method.is_empty() => {
            Some((protocol, method))
        }
        _ => None,
    }
}

pub fn qualify(protocol: &str, method: &str) -> String {
    format!("{}.{}", protocol, method)
}

/// Typed name of a remote method
///
/// Declared once and shared by the registering side and the calling side, so
/// both agree on the argument type `A` and result type `R` at compile time.
///
/// ```
/// use switchboard_rpc::Method;
///
/// const PING: Method<i64, i64> = Method::call("svc.echo", "ping");
/// const LOG: Method<String> = Method::notify("svc.echo", "log");
///
/// assert_eq!(PING.qualified_name(), "svc.echo.ping");
/// ```
pub struct Method<A, R = ()> {
    protocol: &'static str,
    name: &'static str,
    kind: MethodKind,
    _marker: PhantomData<fn(A) -> R>,
}

impl<A, R> Method<A, R> {
    pub const fn call(protocol: &'static str, name: &'static str) -> Self {
        Self {
            protocol,
            name,
            kind: MethodKind::Call,
            _marker: PhantomData,
        }
    }

    pub fn protocol(&self) -> &'static str {
        self.protocol
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    pub fn qualified_name(&self) -> String {
        qualify(self.protocol, self.name)
    }
}

impl<A> Method<A, ()> {
    pub const fn notify(protocol: &'static str, name: &'static str) -> Self {
        Self {
            protocol,
            name,
            kind: MethodKind::Notify,
            _marker: PhantomData,
        }
    }
}

impl<A, R> Clone for Method<A, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, R> Copy for Method<A, R> {}

impl<A, R> fmt::Debug for Method<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("protocol", &self.protocol)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_last_dot() {
        assert_eq!(
            split_qualified("keybase.1.loginUi.getEmailOrUsername"),
            Some(("keybase.1.loginUi", "getEmailOrUsername"))
        );
        assert_eq!(split_qualified("svc.echo.ping"), Some(("svc.echo", "ping")));
    }

    #[test]
    fn rejects_unqualified_names() {
        assert_eq!(split_qualified("ping"), None);
        assert_eq!(split_qualified(".ping"), None);
        assert_eq!(split_qualified("svc.echo."), None);
        assert_eq!(split_qualified(""), None);
    }

    #[test]
    fn method_handles_are_copy() {
        const SHOW: Method<String> = Method::notify("ui", "show");
        let a = SHOW;
        let b = a;
        assert_eq!(a.kind(), MethodKind::Notify);
        assert_eq!(b.qualified_name(), "ui.show");
    }
}
