use crate::state::ResourceState;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AttributeType::String => write!(f, "string"),
        }
    }
}

/// A single configurable attribute of a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: &'static str,
    pub kind: AttributeType,
    pub required: bool,
    /// Value is never logged, displayed or persisted, only its fingerprint.
    pub sensitive: bool,
    /// Changing the value destroys and recreates the remote object.
    pub force_new: bool,
    pub default: Option<&'static str>,
}

impl Attribute {
    pub fn required(name: &'static str) -> Self {
        Self {
            name,
            kind: AttributeType::String,
            required: true,
            sensitive: false,
            force_new: false,
            default: None,
        }
    }

    pub fn optional(name: &'static str, default: &'static str) -> Self {
        Self {
            required: false,
            default: Some(default),
            ..Self::required(name)
        }
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }
}

/// Declarative description of a resource's configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    Create,
    Update { changed: Vec<String> },
    Replace { changed: Vec<String> },
    NoOp,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlanAction::Create => write!(f, "create"),
            PlanAction::Update { changed } => write!(f, "update ({})", changed.join(", ")),
            PlanAction::Replace { changed } => write!(f, "replace ({})", changed.join(", ")),
            PlanAction::NoOp => write!(f, "no changes"),
        }
    }
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn force_new_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|a| a.force_new)
    }

    /// Computes what has to happen to move `prior` to `desired`.
    ///
    /// Sensitive attributes are compared by fingerprint. A change to any
    /// force-new attribute turns the whole plan into a replacement.
    pub fn plan(&self, prior: Option<&ResourceState>, desired: &ResourceState) -> PlanAction {
        let prior = match prior {
            Some(prior) if prior.id().is_some() => prior,
            _ => return PlanAction::Create,
        };

        let changed: Vec<&Attribute> = self
            .attributes
            .iter()
            .filter(|a| {
                if a.sensitive {
                    prior.fingerprint(a.name) != desired.fingerprint(a.name)
                } else {
                    prior.get(a.name) != desired.get(a.name)
                }
            })
            .collect();

        if changed.is_empty() {
            return PlanAction::NoOp;
        }

        let replace = changed.iter().any(|a| a.force_new);
        let changed = changed.iter().map(|a| a.name.to_string()).collect();
        if replace {
            PlanAction::Replace { changed }
        } else {
            PlanAction::Update { changed }
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for attribute in self.attributes.iter() {
            let mut flags = vec![if attribute.required {
                "required"
            } else {
                "optional"
            }];
            if attribute.sensitive {
                flags.push("sensitive");
            }
            if attribute.force_new {
                flags.push("force_new");
            }
            writeln!(
                f,
                "{}: {} [{}]",
                attribute.name,
                attribute.kind,
                flags.join(", ")
            )?;
        }
        Ok(())
    }
}
