mod common;
mod pagination;
mod validation;
