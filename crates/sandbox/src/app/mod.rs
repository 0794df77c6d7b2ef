pub(crate) mod bootstrap;
mod bullet;
mod config_file;
pub(crate) mod loop_runner;
mod physics;
mod turret;
