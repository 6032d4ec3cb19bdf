
mod framer;
mod http;
mod router;
