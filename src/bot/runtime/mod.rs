pub mod task_pool;
