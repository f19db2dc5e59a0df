use parley::infrastructure::llm::{SseDecoder, SseEvent, parse_fragment};

fn chunk(content: &str) -> String {
    format!(
        r#"{{"id":"c1","object":"chat.completion.chunk","choices":[{{"index":0,"delta":{{"content":"{}"}}}}]}}"#,
        content
    )
}

#[test]
fn given_complete_events_when_pushed_then_each_data_payload_is_emitted() {
    let mut decoder = SseDecoder::new();

    let events = decoder.push(b"data: one\n\ndata: two\n\n");

    assert_eq!(
        events,
        vec![
            SseEvent::Data("one".to_string()),
            SseEvent::Data("two".to_string())
        ]
    );
}

#[test]
fn given_event_split_across_chunks_when_pushed_then_it_is_emitted_once_complete() {
    let mut decoder = SseDecoder::new();

    assert!(decoder.push(b"da").is_empty());
    assert!(decoder.push(b"ta: hel").is_empty());
    assert!(decoder.push(b"lo\n").is_empty());
    let events = decoder.push(b"\n");

    assert_eq!(events, vec![SseEvent::Data("hello".to_string())]);
}

#[test]
fn given_multibyte_character_split_across_chunks_when_pushed_then_text_is_intact() {
    let mut decoder = SseDecoder::new();
    let bytes = "data: caf\u{e9}\n\n".as_bytes();
    let split = bytes.len() - 3;

    let mut events = decoder.push(&bytes[..split]);
    events.extend(decoder.push(&bytes[split..]));

    assert_eq!(events, vec![SseEvent::Data("caf\u{e9}".to_string())]);
}

#[test]
fn given_crlf_lines_and_comments_when_pushed_then_comments_are_ignored() {
    let mut decoder = SseDecoder::new();

    let events = decoder.push(b": keep-alive\r\n\r\ndata: x\r\n\r\n");

    assert_eq!(events, vec![SseEvent::Data("x".to_string())]);
}

#[test]
fn given_multiline_data_when_pushed_then_lines_are_joined() {
    let mut decoder = SseDecoder::new();

    let events = decoder.push(b"data: a\ndata: b\n\n");

    assert_eq!(events, vec![SseEvent::Data("a\nb".to_string())]);
}

#[test]
fn given_done_marker_when_pushed_then_decoder_stops() {
    let mut decoder = SseDecoder::new();

    let events = decoder.push(b"data: last\n\ndata: [DONE]\n\ndata: ignored\n\n");

    assert_eq!(
        events,
        vec![SseEvent::Data("last".to_string()), SseEvent::Done]
    );
    assert!(decoder.is_done());
    assert!(decoder.push(b"data: more\n\n").is_empty());
    assert_eq!(decoder.finish(), None);
}

#[test]
fn given_unterminated_event_when_finishing_then_it_is_flushed() {
    let mut decoder = SseDecoder::new();

    assert!(decoder.push(b"data: tail").is_empty());

    assert_eq!(decoder.finish(), Some(SseEvent::Data("tail".to_string())));
}

#[test]
fn given_content_delta_when_parsing_then_fragment_is_returned() {
    assert_eq!(
        parse_fragment(&chunk("He")).unwrap(),
        Some("He".to_string())
    );
}

#[test]
fn given_role_only_delta_when_parsing_then_no_fragment() {
    let data = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;

    assert_eq!(parse_fragment(data).unwrap(), None);
}

#[test]
fn given_empty_content_or_no_choices_when_parsing_then_no_fragment() {
    assert_eq!(parse_fragment(&chunk("")).unwrap(), None);
    assert_eq!(parse_fragment(r#"{"choices":[]}"#).unwrap(), None);
}

#[test]
fn given_malformed_payload_when_parsing_then_error() {
    assert!(parse_fragment("not json").is_err());
}
