use bedrock_ox::prelude::*;
use bedrock_ox::testing::{StreamResponseFake, TextResponseFake};
use futures_util::StreamExt;

#[tokio::test]
async fn streams_text_events_from_the_canonical_sequence() {
    let (client, _fake) = Bedrock::fake(
        [],
        [StreamResponseFake::make("").with_chunks(["Hel", "lo"])],
    );
    let gateway = BedrockGateway::new(client);

    let events: Vec<TextStreamEvent> = gateway
        .stream_text(Some("m1"), None, Vec::new())
        .map(|event| event.unwrap())
        .collect()
        .await;

    assert_eq!(events, vec![
        TextStreamEvent::StreamStart {
            model: "m1".to_string()
        },
        TextStreamEvent::TextStart,
        TextStreamEvent::TextDelta {
            text: "Hel".to_string()
        },
        TextStreamEvent::TextDelta {
            text: "lo".to_string()
        },
        TextStreamEvent::TextEnd,
    ]);
}

#[tokio::test]
async fn generate_text_wires_instructions_and_history() {
    let (client, fake) = Bedrock::fake([TextResponseFake::make().with_text("answer")], []);
    let gateway = BedrockGateway::new(client);

    let response = gateway
        .generate_text(
            Some("m1"),
            Some("Stay factual."),
            vec![
                Message::from(UserMessage::new("question")),
                Message::from(AssistantMessage::new("earlier answer")),
                Message::from(UserMessage::new("follow-up")),
            ],
        )
        .await
        .unwrap();

    assert_eq!(response.text, "answer");
    fake.assert_system_prompt("Stay factual.");
    fake.assert_request(|requests| {
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "m1");
        assert_eq!(requests[0].messages.len(), 3);
        assert!(matches!(requests[0].messages[1], Message::Assistant(_)));
        assert_eq!(requests[0].prompt, None);
    });
}

#[tokio::test]
async fn stream_start_reports_the_default_model_when_none_is_given() {
    let (client, _fake) = Bedrock::fake([], [StreamResponseFake::make("hi")]);
    let default_model = "global.anthropic.claude-sonnet-4-5-20250929-v1:0";
    let gateway = BedrockGateway::new(client);

    let events: Vec<TextStreamEvent> = gateway
        .stream_text(None, None, Vec::new())
        .map(|event| event.unwrap())
        .collect()
        .await;

    assert_eq!(
        events.first(),
        Some(&TextStreamEvent::StreamStart {
            model: default_model.to_string()
        })
    );
}
