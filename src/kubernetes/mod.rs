mod client;

pub use client::KubeLister;
