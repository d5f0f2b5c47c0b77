//! Cache key types for attribute resolution.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Visibility of a guarded method, declared by the interception layer.
///
/// Proxy-style interception can only see public methods; woven interception
/// may guard private ones. The resolver's `public_only` policy consults this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// Identity of a method as seen at the guarded-call boundary.
///
/// There is no runtime reflection to lean on, so the interception layer
/// names the declaring type and the argument types explicitly. Argument
/// types keep overloads apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub declaring_type: Cow<'static, str>,
    pub name: Cow<'static, str>,
    pub arg_types: Vec<Cow<'static, str>>,
    pub visibility: Visibility,
}

impl MethodDescriptor {
    pub fn new(declaring_type: impl Into<Cow<'static, str>>, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
            arg_types: Vec::new(),
            visibility: Visibility::Public,
        }
    }

    /// Descriptor for a method on `T`, using the type's canonical path.
    pub fn of<T: ?Sized>(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(std::any::type_name::<T>(), name)
    }

    pub fn with_arg_types<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Cow<'static, str>>,
    {
        self.arg_types = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// `type::method(arg, arg)` rendering, used as the default breaker name.
    pub fn signature_on(&self, target_type: Option<&str>) -> String {
        let owner = target_type.unwrap_or(&self.declaring_type);
        format!("{}::{}({})", owner, self.name, self.arg_types.join(", "))
    }
}

impl std::fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.signature_on(None))
    }
}

/// Cache key for resolved attributes: method identity plus the (possibly
/// absent) target type. Two keys are equal iff the methods are identical and
/// the optional target types match; overloads never collide because the
/// argument types participate in the method identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    declaring_type: String,
    method: String,
    arg_types: Vec<String>,
    target_type: Option<String>,
}

impl MethodKey {
    pub fn new(method: &MethodDescriptor, target_type: Option<&str>) -> Self {
        Self {
            declaring_type: method.declaring_type.clone().into_owned(),
            method: method.name.clone().into_owned(),
            arg_types: method.arg_types.iter().map(|a| a.clone().into_owned()).collect(),
            target_type: target_type.map(str::to_owned),
        }
    }
}
