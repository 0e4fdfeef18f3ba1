use nom::{
    bytes::complete::{tag, take},
    combinator::{flat_map, map, map_res},
    multi::{count, many_till},
    number::complete::{be_u16, be_u8},
    sequence::tuple,
    IResult,
};

use super::{Flags, Header, Message, MessageType, Question};

pub fn parse_message(packet: &[u8]) -> IResult<&[u8], Message<'_>> {
    let (rest, header) = parse_header(packet)?;
    let (rest, questions) = count(parse_question, header.questions as usize)(rest)?;
    Ok((rest, Message { header, questions }))
}

pub fn parse_header(packet: &[u8]) -> IResult<&[u8], Header> {
    let parse_header = tuple((be_u16, parse_flags, be_u16, be_u16, be_u16, be_u16));
    map(
        parse_header,
        |(
            id,
            flags,
            questions,
            answer_resource_records,
            authority_resource_records,
            additional_resource_records,
        )| Header {
            id,
            flags,
            questions,
            answer_resource_records,
            authority_resource_records,
            additional_resource_records,
        },
    )(packet)
}

fn parse_question(questions: &[u8]) -> IResult<&[u8], Question<'_>> {
    let parse_question = tuple((parse_name, be_u16, be_u16));
    map(parse_question, |(name, type_, class)| Question {
        name,
        type_,
        class,
    })(questions)
}

fn parse_name(label_part: &[u8]) -> IResult<&[u8], Vec<&str>> {
    map(many_till(parse_label, tag("\0")), |(name, _)| name)(label_part)
}

fn parse_label(label_part: &[u8]) -> IResult<&[u8], &str> {
    map_res(flat_map(be_u8, take), std::str::from_utf8)(label_part)
}

fn parse_flags(flags: &[u8]) -> IResult<&[u8], Flags> {
    map(be_u16, |flags| {
        if flags & 0x8000 == 0 {
            Flags {
                message_type: MessageType::Query,
            }
        } else {
            Flags {
                message_type: MessageType::Response,
            }
        }
    })(flags)
}

#[cfg(test)]
mod tests {
    use super::{parse_flags, parse_name};
    use crate::dns::message::MessageType;
    use pretty_assertions::assert_eq;

    #[test]
    fn should_parse_qr_bit() {
        let (_, query) = parse_flags(&[0x01, 0x00]).unwrap();
        let (_, response) = parse_flags(&[0x81, 0x80]).unwrap();

        assert_eq!(query.message_type, MessageType::Query);
        assert_eq!(response.message_type, MessageType::Response);
    }

    #[test]
    fn should_parse_name_until_root_label() {
        let (rest, name) = parse_name(b"\x03www\x07example\x03com\x00\x00\x01").unwrap();

        assert_eq!(name, vec!["www", "example", "com"]);
        assert_eq!(rest, &[0x00, 0x01]);
    }

    #[test]
    fn should_fail_on_truncated_name() {
        assert!(parse_name(b"\x03www\x07exa").is_err());
    }
}
