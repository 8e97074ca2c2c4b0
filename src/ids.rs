use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cell::Cell;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Strongly typed request identifier backed by ULID.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(pub ulid::Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    #[must_use]
    pub fn from_ulid(id: ulid::Ulid) -> Self {
        Self(id)
    }

    /// Reuse a caller-supplied id verbatim, otherwise mint a fresh ULID.
    ///
    /// Caller ids are opaque: upstream proxies are free to use UUIDs or any
    /// other format, so the header value is never re-parsed.
    #[must_use]
    pub fn reuse_or_new(header_value: Option<&str>) -> String {
        match header_value.map(str::trim) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => Self::new().to_string(),
        }
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = ulid::Ulid::from_string(s)?;
        Ok(RequestId(id))
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<RequestId>()
            .map_err(|_| serde::de::Error::custom("invalid request id"))
    }
}

/// Opaque identifier of one logical request in flight inside a worker.
///
/// `ContextId::GLOBAL` is the single slot used by the process-per-request
/// model. The cooperative model allocates a fresh id per request and binds
/// it to the running coroutine, so ambient lookups never cross requests even
/// when many coroutines share one OS thread.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub struct ContextId(u64);

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

may::coroutine_local!(static BOUND_CONTEXT: Cell<Option<ContextId>> = Cell::new(None));

impl ContextId {
    pub const GLOBAL: ContextId = ContextId(0);

    /// Allocate an id that has never been handed out by this process.
    #[must_use]
    pub fn allocate() -> Self {
        ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        ContextId(raw)
    }

    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn is_global(self) -> bool {
        self.0 == 0
    }

    /// The id bound to the running coroutine (or thread), `GLOBAL` if none.
    #[must_use]
    pub fn current() -> Self {
        BOUND_CONTEXT.with(|slot| slot.get()).unwrap_or(Self::GLOBAL)
    }

    /// Bind this id to the running coroutine until the guard is dropped.
    ///
    /// Guards nest: dropping restores whatever binding was active before.
    #[must_use = "the binding is released as soon as the guard is dropped"]
    pub fn bind(self) -> ContextBinding {
        let previous = BOUND_CONTEXT.with(|slot| slot.replace(Some(self)));
        ContextBinding { previous }
    }
}

impl Display for ContextId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Scope guard returned by [`ContextId::bind`].
#[derive(Debug)]
pub struct ContextBinding {
    previous: Option<ContextId>,
}

impl Drop for ContextBinding {
    fn drop(&mut self) {
        let previous = self.previous;
        BOUND_CONTEXT.with(|slot| slot.set(previous));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuse_or_new_keeps_caller_id() {
        assert_eq!(RequestId::reuse_or_new(Some("abc-123")), "abc-123");
        let fresh = RequestId::reuse_or_new(Some("  "));
        assert!(fresh.parse::<RequestId>().is_ok());
        assert!(RequestId::reuse_or_new(None).parse::<RequestId>().is_ok());
    }

    #[test]
    fn test_context_binding_nests() {
        assert_eq!(ContextId::current(), ContextId::GLOBAL);
        let outer = ContextId::allocate();
        let inner = ContextId::allocate();
        assert_ne!(outer, inner);
        {
            let _a = outer.bind();
            assert_eq!(ContextId::current(), outer);
            {
                let _b = inner.bind();
                assert_eq!(ContextId::current(), inner);
            }
            assert_eq!(ContextId::current(), outer);
        }
        assert_eq!(ContextId::current(), ContextId::GLOBAL);
    }
}
