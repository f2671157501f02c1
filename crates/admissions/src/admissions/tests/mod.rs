mod common;
mod queries;
