pub mod core {
    pub mod config;
    pub mod error;
    pub mod startup;
    pub mod state;
    pub mod tracing_init;
}

pub mod handlers {
    pub mod users;
}

pub mod models {
    pub mod user;
}

pub mod stores {
    pub mod user_store;
}

pub mod utils {
    pub mod time;
}

pub mod validation {
    pub mod form;
    pub mod user;
}

pub mod wal {
    pub mod wal;
}
