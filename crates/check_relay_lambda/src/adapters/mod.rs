pub mod command;
pub mod connection_table;
pub mod gateway;
pub mod notifier;
pub mod object_store;
pub mod queue;
