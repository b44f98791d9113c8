pub mod request_event;
