use http::Response;

/// A response head before its body is attached, as consumed by the response encoder.
pub type ResponseHead = Response<()>;
