mod fixtures;
mod http;
mod offline;
mod resolve;
mod snapshots;
mod versions;
