use std::future::ready;
use std::sync::Arc;

use agent_studio_model::{
    ModelFinishReason, ModelMessage, ModelTool, ToolCallFragment,
    ToolCallInvocation, ToolCallResult, ToolChoice,
};
use agent_studio_test_model::{PresetEvent, PresetResponse, TestModelProvider};
use futures_util::StreamExt;
use serde_json::json;

use super::*;
use crate::sink::{self, OutputStream, StreamError};
use crate::tool::{Error as ToolError, LocalBroker, ToolOutcome, ToolOutput};

fn weather_tool() -> ModelTool {
    ModelTool {
        name: "get_weather".to_owned(),
        description: "Looks up the current weather".to_owned(),
        parameters: json!({
            "type": "object",
            "properties": { "city": { "type": "string" } }
        }),
    }
}

fn broker() -> LocalBroker {
    LocalBroker::new().with_tool(weather_tool(), |req| {
        let city = req.arguments["city"].as_str().unwrap_or("?").to_owned();
        ready(Ok(ToolOutput::Json(json!({ "city": city, "temp": 18 }))))
    })
}

fn turn(input: &str, tools: Vec<ModelTool>) -> ChatTurn {
    ChatTurn {
        user_id: "user-1".to_owned(),
        messages: vec![ModelMessage::User(input.to_owned())],
        tools,
    }
}

struct Output {
    text: String,
    chunks: usize,
    error: Option<StreamError>,
}

async fn read_output(mut stream: OutputStream) -> Output {
    let mut output = Output {
        text: String::new(),
        chunks: 0,
        error: None,
    };
    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => {
                output.chunks += 1;
                output.text.push_str(std::str::from_utf8(&chunk).unwrap());
            }
            Err(err) => output.error = Some(err),
        }
    }
    output
}

async fn run_turn(
    provider: &TestModelProvider,
    broker: &LocalBroker,
    options: OrchestratorOptions,
    turn: ChatTurn,
) -> (Result<TurnOutcome, OrchestratorError>, Output) {
    let orchestrator = Orchestrator::new(
        ModelClient::new(provider.clone()),
        Arc::new(broker.clone()),
        options,
    );
    let (sink, stream) = sink::channel(1024);
    let result = orchestrator.run(turn, sink).await;
    (result, read_output(stream).await)
}

fn weather_call_response() -> PresetResponse {
    PresetResponse::with_events([PresetEvent::ToolCallDelta(vec![
        ToolCallFragment::start(0, "call_1", "get_weather"),
        ToolCallFragment::arguments(0, r#"{"city":"#),
        ToolCallFragment::arguments(0, r#""Paris"}"#),
    ])])
}

#[tokio::test]
async fn test_simple_answer() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_text(["4"]));
    let broker = broker();

    let (result, output) = run_turn(
        &provider,
        &broker,
        Default::default(),
        turn("What is 2+2?", vec![]),
    )
    .await;
    let outcome = result.unwrap();
    assert_eq!(output.text, "4");
    assert!(output.error.is_none());
    assert_eq!(outcome.stages, [TurnStage::StreamingPhase1, TurnStage::Done]);
    assert!(broker.calls().is_empty());

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].tool_choice, None);
}

#[tokio::test]
async fn test_text_only_with_tools_available() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_text([
        "No tools ", "needed ", "for that.",
    ]));
    let broker = broker();

    let (result, output) = run_turn(
        &provider,
        &broker,
        Default::default(),
        turn("Hi", vec![weather_tool()]),
    )
    .await;
    result.unwrap();
    assert_eq!(output.text, "No tools needed for that.");
    assert!(broker.calls().is_empty());

    let requests = provider.requests();
    assert_eq!(requests[0].tools, vec![weather_tool()]);
    assert_eq!(requests[0].tool_choice, Some(ToolChoice::Auto));
}

#[tokio::test]
async fn test_single_tool_call() {
    let mut provider = TestModelProvider::default();
    provider.add_response(weather_call_response());
    provider.add_response(PresetResponse::with_text(["It is ", "18°C in Paris."]));
    let broker = broker();

    let (result, output) = run_turn(
        &provider,
        &broker,
        Default::default(),
        turn("Weather in Paris?", vec![weather_tool()]),
    )
    .await;
    let outcome = result.unwrap();
    assert_eq!(
        output.text,
        concat!(
            "\n[running tools...]\n",
            "> get_weather...\n",
            "✔ get_weather done\n",
            "[generating response...]\n\n",
            "It is 18°C in Paris.",
        )
    );
    assert_eq!(
        outcome.stages,
        [
            TurnStage::StreamingPhase1,
            TurnStage::ExecutingTools,
            TurnStage::StreamingPhase2,
            TurnStage::Done,
        ]
    );

    let calls = broker.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "get_weather");
    assert_eq!(calls[0].1.user_id, "user-1");
    assert_eq!(calls[0].1.arguments, json!({ "city": "Paris" }));

    // The follow-up request carries the tool call and its result, and no
    // tools.
    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].tools.is_empty());
    assert_eq!(requests[1].tool_choice, None);
    let tail = &requests[1].messages[1..];
    assert_eq!(
        tail,
        [
            ModelMessage::Assistant(agent_studio_model::AssistantMessage {
                content: String::new(),
                tool_calls: vec![ToolCallInvocation::function(
                    "call_1",
                    "get_weather",
                    r#"{"city":"Paris"}"#,
                )],
            }),
            ModelMessage::Tool(ToolCallResult {
                id: "call_1".to_owned(),
                content: r#"{"city":"Paris","temp":18}"#.to_owned(),
            }),
        ]
    );
    assert_eq!(
        outcome.conversation.messages().last(),
        Some(&ModelMessage::assistant("It is 18°C in Paris."))
    );
}

#[tokio::test]
async fn test_phase_one_text_precedes_tools() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_events([
        PresetEvent::MessageDelta("Let me check.".to_owned()),
        PresetEvent::ToolCallDelta(vec![ToolCallFragment::start(
            0,
            "call_1",
            "get_weather",
        )]),
    ]));
    provider.add_response(PresetResponse::with_text(["Done."]));
    let broker = broker();

    let (result, output) = run_turn(
        &provider,
        &broker,
        Default::default(),
        turn("Weather?", vec![weather_tool()]),
    )
    .await;
    result.unwrap();
    assert!(output.text.starts_with("Let me check.\n[running tools...]\n"));
    assert!(output.text.ends_with("[generating response...]\n\nDone."));

    // Empty arguments are sent as an empty object.
    assert_eq!(broker.calls()[0].1.arguments, json!({}));
    let requests = provider.requests();
    let ModelMessage::Assistant(assistant) = &requests[1].messages[1] else {
        panic!("unexpected message: {:?}", requests[1].messages[1]);
    };
    assert_eq!(assistant.content, "Let me check.");
}

#[tokio::test]
async fn test_tools_run_in_index_order() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_events([
        PresetEvent::ToolCallDelta(vec![
            ToolCallFragment::start(2, "call_c", "get_weather"),
            ToolCallFragment::start(0, "call_a", "get_weather"),
        ]),
        PresetEvent::ToolCallDelta(vec![
            ToolCallFragment::start(1, "call_b", "get_weather"),
            ToolCallFragment::arguments(2, r#"{"city":"C"}"#),
            ToolCallFragment::arguments(0, r#"{"city":"A"}"#),
            ToolCallFragment::arguments(1, r#"{"city":"B"}"#),
        ]),
    ]));
    provider.add_response(PresetResponse::with_text(["ok"]));
    let broker = broker();

    let (result, _) = run_turn(
        &provider,
        &broker,
        Default::default(),
        turn("Weather in A, B and C?", vec![weather_tool()]),
    )
    .await;
    let outcome = result.unwrap();
    let cities: Vec<_> = broker
        .calls()
        .into_iter()
        .map(|(_, req)| req.arguments["city"].clone())
        .collect();
    assert_eq!(cities, [json!("A"), json!("B"), json!("C")]);
    let ids: Vec<_> = outcome
        .tool_results
        .iter()
        .map(|result| result.tool_call_id.as_str())
        .collect();
    assert_eq!(ids, ["call_a", "call_b", "call_c"]);
}

#[tokio::test]
async fn test_invalid_arguments_are_passed_raw() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_events([
        PresetEvent::ToolCallDelta(vec![
            ToolCallFragment::start(0, "call_1", "get_weather"),
            ToolCallFragment::arguments(0, r#"{"city": "Par"#),
        ]),
    ]));
    provider.add_response(PresetResponse::with_text(["Sorry."]));
    let broker = broker();

    let (result, output) = run_turn(
        &provider,
        &broker,
        Default::default(),
        turn("Weather?", vec![weather_tool()]),
    )
    .await;
    result.unwrap();
    assert!(output.text.contains("✔ get_weather done\n"));
    assert_eq!(
        broker.calls()[0].1.arguments,
        json!({ "$raw": r#"{"city": "Par"# })
    );
}

#[tokio::test]
async fn test_tool_failure_is_reported_to_the_model() {
    let mut provider = TestModelProvider::default();
    provider.add_response(weather_call_response());
    provider.add_response(PresetResponse::with_text(["I could not check."]));
    let broker = LocalBroker::new().with_tool(weather_tool(), |_| {
        ready(Err(ToolError::execution_error().with_reason("rate limited")))
    });

    let (result, output) = run_turn(
        &provider,
        &broker,
        Default::default(),
        turn("Weather in Paris?", vec![weather_tool()]),
    )
    .await;
    let outcome = result.unwrap();
    assert_eq!(
        output.text,
        concat!(
            "\n[running tools...]\n",
            "> get_weather...\n",
            "✖ tool failed: rate limited\n",
            "[generating response...]\n\n",
            "I could not check.",
        )
    );
    assert_eq!(
        outcome.tool_results[0].outcome,
        ToolOutcome::Failed("rate limited".to_owned())
    );
    let requests = provider.requests();
    assert_eq!(
        requests[1].messages.last(),
        Some(&ModelMessage::Tool(ToolCallResult {
            id: "call_1".to_owned(),
            content: "Tool execution failed: rate limited".to_owned(),
        }))
    );
}

#[tokio::test]
async fn test_tool_calls_finish_without_fragments() {
    let mut provider = TestModelProvider::default();
    provider.add_response(
        PresetResponse::with_events(Vec::<PresetEvent>::new())
            .with_finish_reason(Some(ModelFinishReason::ToolCalls)),
    );
    provider.add_response(PresetResponse::with_text(["Hello."]));
    let broker = broker();

    let (result, output) = run_turn(
        &provider,
        &broker,
        Default::default(),
        turn("Hi", vec![weather_tool()]),
    )
    .await;
    let outcome = result.unwrap();
    assert_eq!(
        output.text,
        "\n[running tools...]\n[generating response...]\n\nHello."
    );
    assert!(outcome.tool_results.is_empty());
    assert!(broker.calls().is_empty());
}

#[tokio::test]
async fn test_empty_completion() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_events(Vec::<PresetEvent>::new()));
    let broker = broker();

    let (result, output) =
        run_turn(&provider, &broker, Default::default(), turn("Hi", vec![]))
            .await;
    result.unwrap();
    assert_eq!(output.text, "");
    assert_eq!(output.chunks, 1);
    assert!(output.error.is_none());
}

#[tokio::test]
async fn test_upstream_failure_mid_stream() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_events([
        PresetEvent::MessageDelta("The answer is".to_owned()),
        PresetEvent::Failure("connection reset".to_owned()),
    ]));
    let broker = broker();

    let (result, output) =
        run_turn(&provider, &broker, Default::default(), turn("Hi", vec![]))
            .await;
    assert!(matches!(result, Err(OrchestratorError::Model(_))));
    assert_eq!(output.text, "The answer is\n[error] connection reset\n");
    assert_eq!(
        output.error.as_ref().map(StreamError::message),
        Some("connection reset")
    );
}

#[tokio::test]
async fn test_follow_up_request_failure() {
    let mut provider = TestModelProvider::default();
    provider.add_response(weather_call_response());
    let broker = broker();

    let (result, output) = run_turn(
        &provider,
        &broker,
        Default::default(),
        turn("Weather in Paris?", vec![weather_tool()]),
    )
    .await;
    assert!(result.is_err());
    assert!(output.text.starts_with("\n[running tools...]\n"));
    assert!(output.text.ends_with("[generating response...]\n\n\n[error] no enough steps\n"));
    assert!(output.error.is_some());
}

#[tokio::test]
async fn test_system_prompt_and_event_progress() {
    let mut provider = TestModelProvider::default();
    provider.add_response(weather_call_response());
    provider.add_response(PresetResponse::with_text(["Sunny."]));
    let broker = broker();
    let options = OrchestratorOptions {
        system_prompt: Some("Answer in Markdown.".to_owned()),
        progress_style: ProgressStyle::Events,
    };

    let (result, output) = run_turn(
        &provider,
        &broker,
        options,
        turn("Weather in Paris?", vec![weather_tool()]),
    )
    .await;
    result.unwrap();

    let requests = provider.requests();
    assert_eq!(
        requests[0].messages[0],
        ModelMessage::System("Answer in Markdown.".to_owned())
    );

    let blocks = agent_studio_protocol::split_content_aggregated(&output.text);
    let tool = blocks
        .iter()
        .find_map(|block| match block {
            agent_studio_protocol::ContentBlock::ToolAggregate(tool) => {
                Some(tool)
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(tool.run_id, "call_1");
    assert_eq!(tool.input, Some(json!({ "city": "Paris" })));
    assert!(tool.is_finished());
    assert!(output.text.ends_with("[generating response...]\n\nSunny."));
}

#[tokio::test]
async fn test_client_disconnect() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_text(["Hello"]));
    let orchestrator = Orchestrator::new(
        ModelClient::new(provider),
        Arc::new(broker()),
        Default::default(),
    );
    let (sink, stream) = sink::channel(4);
    drop(stream);
    let result = orchestrator.run(turn("Hi", vec![]), sink).await;
    assert!(matches!(
        result,
        Err(OrchestratorError::Stream(SinkError::Closed))
    ));
}
