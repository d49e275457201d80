// SPDX-License-Identifier: BSD-3-Clause
use std::fmt::{self, Display};
use std::sync::Arc;

/// An IR identifier: either a symbolic name or a slot number assigned to an
/// unnamed value.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Name {
    Named(String),
    Number(usize),
}

impl Name {
    pub(crate) fn text(&self) -> Option<&str> {
        match self {
            Name::Named(s) => Some(s),
            Name::Number(_) => None,
        }
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::Named(s.to_string())
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name::Named(s)
    }
}

impl From<usize> for Name {
    fn from(n: usize) -> Self {
        Name::Number(n)
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Name::Named(s) => write!(f, "{}", s),
            Name::Number(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct GlobalName(pub(crate) Name);

impl GlobalName {
    pub fn new(name: impl Into<Name>) -> Self {
        GlobalName(name.into())
    }
}

impl From<&str> for GlobalName {
    fn from(s: &str) -> Self {
        GlobalName(Name::from(s))
    }
}

impl Display for GlobalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct FunctionName(pub(crate) Name);

impl FunctionName {
    pub fn new(name: impl Into<Name>) -> Self {
        FunctionName(name.into())
    }

    pub(crate) fn text(&self) -> Option<&str> {
        self.0.text()
    }

    pub(crate) fn starts_with(&self, prefix: &str) -> bool {
        self.0.text().is_some_and(|s| s.starts_with(prefix))
    }
}

impl From<&str> for FunctionName {
    fn from(s: &str) -> Self {
        FunctionName(Name::from(s))
    }
}

impl Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A local value name, qualified by the function that owns it. Arguments
/// and instruction results share one namespace per function.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalName {
    pub(crate) parent: FunctionName,
    pub(crate) name: Name,
}

impl LocalName {
    pub fn new(parent: &FunctionName, name: impl Into<Name>) -> Arc<Self> {
        Arc::new(LocalName {
            parent: parent.clone(),
            name: name.into(),
        })
    }
}

impl Display for LocalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::%{}", self.parent, self.name)
    }
}
