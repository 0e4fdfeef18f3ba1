use anyhow::{anyhow, Result};
use bytes::Bytes;
use std::fmt;

mod parsers;

#[derive(Debug, Clone)]
pub struct Query {
    request: Bytes,
    header: Header,
}

impl Query {
    pub fn from_bytes(bytes: Bytes) -> Result<Self> {
        let header = Header::from_packet(&bytes)?;
        if matches!(header.flags.message_type, MessageType::Query) {
            Ok(Self {
                request: bytes,
                header,
            })
        } else {
            Err(anyhow!("Got dns response"))
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn parse(&self) -> Result<Message<'_>> {
        Message::from_packet(self.bytes())
    }

    pub fn bytes(&self) -> &Bytes {
        &self.request
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parse() {
            Ok(message) => write!(
                f,
                "#{} {:?}",
                self.header.id,
                message.domains().collect::<Vec<_>>()
            ),
            Err(_) => write!(f, "#{} ({} bytes)", self.header.id, self.request.len()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    response: Bytes,
    header: Header,
}

impl Response {
    pub fn from_bytes(bytes: Bytes) -> Result<Self> {
        let header = Header::from_packet(&bytes)?;
        if matches!(header.flags.message_type, MessageType::Response) {
            Ok(Self {
                response: bytes,
                header,
            })
        } else {
            Err(anyhow!("Got dns query"))
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn bytes(&self) -> &Bytes {
        &self.response
    }
}

/// Header plus question section. Resource records are relayed untouched and never parsed.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Message<'a> {
    pub header: Header,
    pub questions: Vec<Question<'a>>,
}

impl Message<'_> {
    fn from_packet(packet: &[u8]) -> Result<Message<'_>> {
        match parsers::parse_message(packet) {
            Ok((_, msg)) => Ok(msg),
            Err(err) => Err(anyhow!(
                "got error while parsing dns message. Err: {:?}, raw_packet: {:02X?}",
                err,
                packet
            )),
        }
    }

    pub fn domains(&self) -> impl Iterator<Item = String> + '_ {
        self.questions.iter().map(|q| q.name.join("."))
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum MessageType {
    Query,
    Response,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Flags {
    pub message_type: MessageType,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Header {
    pub id: u16,
    pub flags: Flags,
    pub questions: u16,
    pub answer_resource_records: u16,
    pub authority_resource_records: u16,
    pub additional_resource_records: u16,
}

impl Header {
    fn from_packet(packet: &[u8]) -> Result<Header> {
        match parsers::parse_header(packet) {
            Ok((_, header)) => Ok(header),
            Err(err) => Err(anyhow!(
                "got error while parsing dns header. Err: {:?}, raw_packet: {:02X?}",
                err,
                packet
            )),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Question<'a> {
    pub name: Vec<&'a str>,
    pub type_: u16,
    pub class: u16,
}

#[cfg(test)]
mod tests {
    use super::{Flags, Header, Message, MessageType, Query, Question, Response};
    use crate::dns::test_utils::{query_bytes, response_bytes};
    use anyhow::Result;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;

    #[test]
    fn should_parse_query() -> Result<()> {
        let query = Query::from_bytes(query_bytes(0xa542, "www.google.com"))?;

        assert_eq!(
            query.parse()?,
            Message {
                header: Header {
                    id: 0xa542,
                    flags: Flags {
                        message_type: MessageType::Query,
                    },
                    questions: 1,
                    answer_resource_records: 0,
                    authority_resource_records: 0,
                    additional_resource_records: 0,
                },
                questions: vec![Question {
                    name: vec!["www", "google", "com"],
                    type_: 1,
                    class: 1,
                }],
            }
        );
        Ok(())
    }

    #[test]
    fn should_parse_response_header() -> Result<()> {
        let response = Response::from_bytes(response_bytes(0x6d5c, "api.browser.yandex.com"))?;

        assert_eq!(response.header().id, 0x6d5c);
        assert_eq!(
            response.header().flags.message_type,
            MessageType::Response
        );
        assert_eq!(response.header().answer_resource_records, 1);
        Ok(())
    }

    #[test]
    fn should_reject_response_as_query() {
        assert!(Query::from_bytes(response_bytes(1, "example.com")).is_err());
        assert!(Response::from_bytes(query_bytes(1, "example.com")).is_err());
    }

    #[test]
    fn should_reject_truncated_header() {
        assert!(Query::from_bytes(Bytes::from_static(&[0x12, 0x34, 0x01])).is_err());
    }

    #[test]
    fn should_display_query_domains() -> Result<()> {
        let query = Query::from_bytes(query_bytes(7, "example.com"))?;

        assert_eq!(query.to_string(), r#"#7 ["example.com"]"#);
        Ok(())
    }

    #[test]
    fn should_display_unparsed_query_by_size() -> Result<()> {
        let mut packet = query_bytes(9, "example.com").to_vec();
        packet.truncate(15);
        let query = Query::from_bytes(Bytes::from(packet))?;

        assert_eq!(query.to_string(), "#9 (15 bytes)");
        Ok(())
    }
}
