pub mod linalg;

#[cfg(test)]
pub(crate) mod testing;
