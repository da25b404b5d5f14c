pub(crate) mod inspect;
pub(crate) mod logs;
pub(crate) mod targets;
