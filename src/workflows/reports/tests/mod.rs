mod claims;
mod common;
