use crate::codec::body::LengthDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Decodes a request head, then its body as chunks followed by a single EOF marker.
///
/// While `payload_decoder` is `None` the decoder is looking for a head; a request with a
/// `Content-Length` installs a [`LengthDecoder`] that stays until it has emitted EOF.
/// Requests without a body emit no payload items at all.
#[derive(Debug, Default)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<LengthDecoder>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };

            return Ok(message);
        }

        let message = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                if let PayloadSize::Length(length) = payload_size {
                    self.payload_decoder = Some(LengthDecoder::new(length));
                }
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn decode_head_body_and_next_head() {
        let mut buf = BytesMut::from(
            &b"POST /upload HTTP/1.1\r\nContent-Length: 5\r\n\r\nHELLOGET / HTTP/1.1\r\nHost: localhost\r\n\r\n"[..],
        );
        let mut decoder = RequestDecoder::new();

        let Some(Message::Header((header, size))) = decoder.decode(&mut buf).unwrap() else {
            panic!("expect request head");
        };
        assert_eq!(header.uri().path(), "/upload");
        assert_eq!(size, PayloadSize::Length(5));

        let item = decoder.decode(&mut buf).unwrap().unwrap().into_payload_item().unwrap();
        assert_eq!(item, PayloadItem::Chunk(Bytes::from_static(b"HELLO")));

        let item = decoder.decode(&mut buf).unwrap().unwrap().into_payload_item().unwrap();
        assert!(item.is_eof());

        let Some(Message::Header((header, size))) = decoder.decode(&mut buf).unwrap() else {
            panic!("expect second request head");
        };
        assert_eq!(header.uri().path(), "/");
        assert!(size.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn bodyless_request_has_no_payload_items() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\n\r\n"[..]);
        let mut decoder = RequestDecoder::new();

        assert!(decoder.decode(&mut buf).unwrap().unwrap().is_header());
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }
}
