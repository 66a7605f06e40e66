//! List change records and the model types that carry them.
//!
//! A list mutation travels as one transient model per operation. The model
//! type names the operation and its direction; the attributes carry the
//! source bean, the list attribute, and either a position plus one element
//! (ADD, REPLACE) or a half-open range (REMOVE).
//!
//! ```text
//! ADD     { source, attribute, pos, element }
//! REMOVE  { source, attribute, from, to }
//! REPLACE { source, attribute, pos, element }
//! ```

use crate::config::Side;
use crate::error::{RemotingError, RemotingResult};
use beanlink_store::{Attribute, ModelSnapshot};
use beanlink_types::{ModelId, WireValue};
use std::fmt;

/// Model type of class-metadata models.
pub const CLASS_MODEL_TYPE: &str = "@@@ BEAN_CLASS @@@";
/// Attribute of a class-metadata model holding the class name.
pub const CLASS_NAME_ATTRIBUTE: &str = "@@@ CLASS_NAME @@@";

pub const ADD_FROM_SERVER: &str = "@@@ LIST_ADD_FROM_SERVER @@@";
pub const DEL_FROM_SERVER: &str = "@@@ LIST_DEL_FROM_SERVER @@@";
pub const SET_FROM_SERVER: &str = "@@@ LIST_SET_FROM_SERVER @@@";
pub const ADD_FROM_CLIENT: &str = "@@@ LIST_ADD_FROM_CLIENT @@@";
pub const DEL_FROM_CLIENT: &str = "@@@ LIST_DEL_FROM_CLIENT @@@";
pub const SET_FROM_CLIENT: &str = "@@@ LIST_SET_FROM_CLIENT @@@";

pub const SOURCE: &str = "source";
pub const ATTRIBUTE: &str = "attribute";
pub const POS: &str = "pos";
pub const FROM: &str = "from";
pub const TO: &str = "to";
pub const ELEMENT: &str = "element";

/// The three list operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListOpKind {
    Add,
    Remove,
    Replace,
}

impl ListOpKind {
    pub const ALL: [ListOpKind; 3] = [ListOpKind::Add, ListOpKind::Remove, ListOpKind::Replace];
}

impl Side {
    /// Model type used when this side emits an operation of `kind`.
    #[must_use]
    pub fn outbound_record_type(self, kind: ListOpKind) -> &'static str {
        match (self, kind) {
            (Side::Controller, ListOpKind::Add) => ADD_FROM_SERVER,
            (Side::Controller, ListOpKind::Remove) => DEL_FROM_SERVER,
            (Side::Controller, ListOpKind::Replace) => SET_FROM_SERVER,
            (Side::Presentation, ListOpKind::Add) => ADD_FROM_CLIENT,
            (Side::Presentation, ListOpKind::Remove) => DEL_FROM_CLIENT,
            (Side::Presentation, ListOpKind::Replace) => SET_FROM_CLIENT,
        }
    }

    /// Model type this side listens to for operations of `kind`.
    #[must_use]
    pub fn inbound_record_type(self, kind: ListOpKind) -> &'static str {
        self.opposite().outbound_record_type(kind)
    }

    /// Classifies a model type as an inbound record kind for this side.
    #[must_use]
    pub fn inbound_kind(self, model_type: &str) -> Option<ListOpKind> {
        ListOpKind::ALL
            .into_iter()
            .find(|kind| self.inbound_record_type(*kind) == model_type)
    }

    /// All model types this side listens to.
    #[must_use]
    pub fn inbound_record_types(self) -> [&'static str; 3] {
        ListOpKind::ALL.map(|kind| self.inbound_record_type(kind))
    }
}

/// One list operation, positions relative to the list after all previous
/// operations of the same batch were applied.
#[derive(Debug, Clone, PartialEq)]
pub enum ListOp {
    Add { pos: usize, element: WireValue },
    Remove { from: usize, to: usize },
    Replace { pos: usize, element: WireValue },
}

impl ListOp {
    #[must_use]
    pub fn kind(&self) -> ListOpKind {
        match self {
            ListOp::Add { .. } => ListOpKind::Add,
            ListOp::Remove { .. } => ListOpKind::Remove,
            ListOp::Replace { .. } => ListOpKind::Replace,
        }
    }
}

impl fmt::Display for ListOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListOp::Add { pos, element } => write!(f, "ADD {pos} {element}"),
            ListOp::Remove { from, to } => write!(f, "REMOVE [{from}, {to})"),
            ListOp::Replace { pos, element } => write!(f, "REPLACE {pos} {element}"),
        }
    }
}

/// A list operation addressed to one list of one bean.
#[derive(Debug, Clone, PartialEq)]
pub struct ListChangeRecord {
    pub source: ModelId,
    pub attribute: String,
    pub op: ListOp,
}

impl ListChangeRecord {
    /// Attributes of the transient model carrying this record.
    #[must_use]
    pub fn to_attributes(&self) -> Vec<Attribute> {
        let mut attributes = vec![
            Attribute::new(SOURCE, self.source.as_str()),
            Attribute::new(ATTRIBUTE, self.attribute.as_str()),
        ];
        match &self.op {
            ListOp::Add { pos, element } | ListOp::Replace { pos, element } => {
                attributes.push(Attribute::new(POS, *pos));
                attributes.push(Attribute::new(ELEMENT, element.clone()));
            }
            ListOp::Remove { from, to } => {
                attributes.push(Attribute::new(FROM, *from));
                attributes.push(Attribute::new(TO, *to));
            }
        }
        attributes
    }

    /// Decodes a record model of the given kind.
    pub fn from_model(model: &ModelSnapshot, kind: ListOpKind) -> RemotingResult<Self> {
        let source = ModelId::new(text_attribute(model, SOURCE)?);
        let attribute = text_attribute(model, ATTRIBUTE)?.to_string();
        let op = match kind {
            ListOpKind::Add => ListOp::Add {
                pos: index_attribute(model, POS)?,
                element: element_attribute(model)?,
            },
            ListOpKind::Replace => ListOp::Replace {
                pos: index_attribute(model, POS)?,
                element: element_attribute(model)?,
            },
            ListOpKind::Remove => {
                let from = index_attribute(model, FROM)?;
                let to = index_attribute(model, TO)?;
                if from > to {
                    return Err(RemotingError::Protocol(format!(
                        "inverted range [{from}, {to})"
                    )));
                }
                ListOp::Remove { from, to }
            }
        };
        Ok(Self {
            source,
            attribute,
            op,
        })
    }
}

fn text_attribute<'a>(model: &'a ModelSnapshot, name: &str) -> RemotingResult<&'a str> {
    match model.attribute(name) {
        Some(WireValue::Text(s)) => Ok(s),
        Some(other) => Err(RemotingError::Protocol(format!(
            "attribute {name} must be text, found {}",
            other.type_name()
        ))),
        None => Err(RemotingError::Protocol(format!("missing attribute {name}"))),
    }
}

fn index_attribute(model: &ModelSnapshot, name: &str) -> RemotingResult<usize> {
    match model.attribute(name) {
        Some(WireValue::Int(i)) => usize::try_from(*i)
            .map_err(|_| RemotingError::Protocol(format!("negative index {name}={i}"))),
        Some(other) => Err(RemotingError::Protocol(format!(
            "attribute {name} must be an integer, found {}",
            other.type_name()
        ))),
        None => Err(RemotingError::Protocol(format!("missing attribute {name}"))),
    }
}

fn element_attribute(model: &ModelSnapshot) -> RemotingResult<WireValue> {
    model
        .attribute(ELEMENT)
        .cloned()
        .ok_or_else(|| RemotingError::Protocol(format!("missing attribute {ELEMENT}")))
}
