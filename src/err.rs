use thiserror::Error;

use crate::model::EntityRef;

/// Violations of the entity model's insertion invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("duplicate {kind} value {value} in provider `{provider}`")]
    DuplicateValue {
        provider: String,
        kind: &'static str,
        value: u64,
    },

    #[error("duplicate {kind} name `{name}` in provider `{provider}`")]
    DuplicateName {
        provider: String,
        kind: &'static str,
        name: String,
    },

    #[error("duplicate provider {what}: `{value}`")]
    DuplicateProvider { what: &'static str, value: String },

    #[error("keyword `{name}` mask 0x{mask:016x} must have exactly one bit set")]
    InvalidKeywordMask { name: String, mask: u64 },

    #[error("{kind} handle #{index} does not belong to provider `{provider}`")]
    DanglingHandle {
        provider: String,
        kind: &'static str,
        index: usize,
    },

    #[error("property `{property}` of template `{template}` references unknown sibling `{target}`")]
    UnknownPropertyReference {
        template: String,
        property: String,
        target: String,
    },

    #[error("property `{property}` of template `{template}` cannot reference a struct for its {what}")]
    StructPropertyReference {
        template: String,
        property: String,
        what: &'static str,
    },
}

/// User error raised while assigning message identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error(
        "provider index {index} does not fit the 4-bit provider field of a message identifier (maximum 15 providers with generated messages)"
    )]
    ProviderIndexOutOfRange { index: usize },
}

/// An encoder bug, never caused by user input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InternalFault {
    #[error("offset of {entity:?} was requested before it was written")]
    UnresolvedOffset { entity: EntityRef },

    #[error("offset of {entity:?} was recorded twice")]
    DuplicateOffset { entity: EntityRef },

    #[error("message identifier of {entity:?} was assigned twice")]
    DuplicateMessageId { entity: EntityRef },

    #[error("layout violation: {message}")]
    Layout { message: String },
}

/// Failure while assigning message identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssignError {
    #[error(transparent)]
    Id(#[from] IdError),

    #[error(transparent)]
    Internal(#[from] InternalFault),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Internal(#[from] InternalFault),

    #[error("failed to serialize template `{template}` as XML")]
    Xml {
        template: String,
        #[source]
        source: quick_xml::Error,
    },

    #[error("encoded output of {size} bytes exceeds the 4GiB offset space")]
    OutputTooLarge { size: usize },

    #[error("field `{field}` value {value} does not fit its on-disk width")]
    ValueOutOfRange { field: &'static str, value: u64 },

    #[error("message 0x{id:08X} cannot be represented in code page `{code_page}`: {reason}")]
    CodePage {
        id: u32,
        code_page: &'static str,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("compilation skipped: {count} error(s) were reported before compiling")]
    PriorErrors { count: usize },

    #[error("failed to assign message identifiers")]
    MessageIds(#[from] IdError),

    #[error("internal compiler fault: {0}")]
    Internal(#[from] InternalFault),

    #[error("{count} error(s) were reported while emitting artifacts")]
    EmissionFailed { count: usize },
}

impl From<AssignError> for CompileError {
    fn from(err: AssignError) -> Self {
        match err {
            AssignError::Id(e) => CompileError::MessageIds(e),
            AssignError::Internal(fault) => CompileError::Internal(fault),
        }
    }
}
