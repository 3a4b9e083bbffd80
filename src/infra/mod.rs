pub mod clock;
pub mod http_client;
pub mod in_memory_host;
pub mod local_host;
pub mod supabase_host;
