mod support;

mod executor_settle;
mod mode_switch;
mod session;
mod simulation;
