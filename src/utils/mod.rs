pub mod async_msg;
