pub mod queue_monitor;
