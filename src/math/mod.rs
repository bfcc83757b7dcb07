pub(crate) mod checked_ops;
pub(crate) mod num_ext;
