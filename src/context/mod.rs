//! Per-request context — the parsed request plus request-scoped state.
//!
//! A [`Context`] is created by the server for each parsed request and handed
//! through the middleware chain to the terminal handler. Request-scoped state
//! travels in a type-erased [`Extensions`] map so that middleware layers can
//! inject values (an authenticated principal, a request id) without knowing
//! about each other's types.
//!
//! The caller's authentication state is modeled explicitly as [`AuthState`]
//! rather than probed from optional attributes: upstream middleware inserts
//! an `AuthState` into the extensions, and [`Context::auth_state`] reads it
//! back, reporting [`AuthState::Unknown`] when nothing was injected.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

use crate::Request;

/// The authentication state associated with a request.
///
/// `Authenticated` and `Anonymous` are mutually exclusive states set by
/// whatever authentication layer the host application runs upstream; this
/// crate never performs authentication itself. `Unknown` means no upstream
/// layer recorded a state — requests in that state match neither
/// authenticated-only nor anonymous-only cache rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AuthState {
    /// The request is associated with a logged-in identity.
    Authenticated,
    /// The request was explicitly recognized as unauthenticated.
    Anonymous,
    /// No authentication layer ran, or it recorded nothing.
    #[default]
    Unknown,
}

impl AuthState {
    /// Returns `true` for [`AuthState::Authenticated`].
    pub fn is_authenticated(self) -> bool {
        self == Self::Authenticated
    }

    /// Returns `true` for [`AuthState::Anonymous`].
    pub fn is_anonymous(self) -> bool {
        self == Self::Anonymous
    }
}

/// Type-erased request extensions map — used to inject per-request state
/// into downstream layers without coupling them to each other's types.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Creates a new empty extensions map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing any previous value of the same type.
    pub fn insert<T>(&mut self, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.map.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Returns a reference to the value of type `T`, if present.
    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Returns a mutable reference to the value of type `T`, if present.
    pub fn get_mut<T>(&mut self) -> Option<&mut T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    /// Removes and returns the value of type `T`, if present.
    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

/// Per-request context carried through the middleware chain.
pub struct Context {
    request: Request,
    extensions: Extensions,
}

impl Context {
    /// Creates a new context from a parsed request with empty extensions.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            extensions: Extensions::new(),
        }
    }

    /// Returns the parsed request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Returns the request extensions.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Returns the request extensions mutably, for middleware that injects state.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Returns the authentication state recorded for this request.
    ///
    /// Falls back to [`AuthState::Unknown`] when no upstream layer injected one.
    pub fn auth_state(&self) -> AuthState {
        self.extensions.get::<AuthState>().copied().unwrap_or_default()
    }

    /// Deserializes the request body as JSON into `T`.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }
}
