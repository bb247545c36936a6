pub mod in_memory_cluster;
