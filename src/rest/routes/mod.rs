pub mod braindumps;
pub mod health;
