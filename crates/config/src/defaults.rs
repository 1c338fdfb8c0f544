pub fn default_redis_port() -> u16 {
    6379
}

pub fn default_connect_attempts() -> u32 {
    3
}

pub fn default_retry_backoff_ms() -> u64 {
    1000
}

pub fn default_diff_time_max_secs() -> u64 {
    60
}

pub fn default_loop_interval_ms() -> u64 {
    1000
}
