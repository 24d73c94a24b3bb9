pub mod auth;
pub mod front_end;
pub mod swagger_main;
pub mod todo;

#[cfg(test)]
pub mod test_util;
