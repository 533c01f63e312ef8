use scriptorium_core::{GenerateRequest, Message};
use scriptorium_interface::FinishReason;
use scriptorium_server::{
    ChatCompletionChunk, ChatCompletionResponse, OllamaGenerateResponse, chunk_to_stream_chunk,
    from_chat_response, from_ollama_response, ollama_to_stream_chunk, to_chat_request,
    to_ollama_request,
};

fn request(stream: bool) -> GenerateRequest {
    GenerateRequest::builder()
        .messages(vec![
            Message::system("You are a careful novelist."),
            Message::user("Write the opening."),
        ])
        .temperature(Some(0.7))
        .top_p(Some(0.9))
        .max_tokens(Some(512u32))
        .stream(stream)
        .build()
        .unwrap()
}

#[test]
fn test_chat_request_carries_roles_and_sampling() {
    let chat = to_chat_request(&request(false), "llama3").unwrap();
    assert_eq!(chat.model, "llama3");
    assert_eq!(chat.messages.len(), 2);
    assert_eq!(chat.messages[0].role, "system");
    assert_eq!(chat.messages[1].role, "user");
    assert_eq!(chat.temperature, Some(0.7));
    assert_eq!(chat.top_p, Some(0.9));
    assert_eq!(chat.max_tokens, Some(512));
    assert_eq!(chat.stream, Some(false));
}

#[test]
fn test_request_model_override_wins() {
    let req = GenerateRequest::builder()
        .messages(vec![Message::user("hi")])
        .model(Some("mistral".to_string()))
        .build()
        .unwrap();
    assert_eq!(to_chat_request(&req, "llama3").unwrap().model, "mistral");
    assert_eq!(to_ollama_request(&req, "llama3").unwrap().model, "mistral");
}

#[test]
fn test_empty_request_rejected() {
    let req = GenerateRequest::builder().messages(vec![]).build().unwrap();
    assert!(to_chat_request(&req, "llama3").is_err());
    assert!(to_ollama_request(&req, "llama3").is_err());
}

#[test]
fn test_ollama_request_splits_system_and_prompt() {
    let body = to_ollama_request(&request(true), "llama3").unwrap();
    assert_eq!(body.system.as_deref(), Some("You are a careful novelist."));
    assert_eq!(body.prompt, "Write the opening.");
    assert!(body.stream);
    assert_eq!(body.options.num_predict, Some(512));

    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["options"]["temperature"].as_f64().map(|t| t as f32), Some(0.7));
}

#[test]
fn test_chat_response_tolerates_missing_bookkeeping() {
    let response: ChatCompletionResponse = serde_json::from_str(
        r#"{"choices":[{"message":{"role":"assistant","content":"The harbor woke."}}]}"#,
    )
    .unwrap();
    let converted = from_chat_response(response).unwrap();
    assert_eq!(converted.text(), "The harbor woke.");
}

#[test]
fn test_chat_response_without_choices_is_error() {
    let response: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
    assert!(from_chat_response(response).is_err());
}

#[test]
fn test_sse_chunk_conversion() {
    let chunk: ChatCompletionChunk = serde_json::from_str(
        r#"{"id":"c1","model":"m","choices":[{"index":0,"delta":{"content":"Salt"}}]}"#,
    )
    .unwrap();
    let converted = chunk_to_stream_chunk(chunk).unwrap();
    assert_eq!(converted.content(), "Salt");
    assert!(!*converted.is_final());

    let last: ChatCompletionChunk = serde_json::from_str(
        r#"{"choices":[{"index":0,"delta":{},"finish_reason":"length"}]}"#,
    )
    .unwrap();
    let converted = chunk_to_stream_chunk(last).unwrap();
    assert!(*converted.is_final());
    assert_eq!(*converted.finish_reason(), Some(FinishReason::Length));
}

#[test]
fn test_ollama_line_conversion() {
    let line: OllamaGenerateResponse =
        serde_json::from_str(r#"{"model":"llama3","response":"tide","done":false}"#).unwrap();
    let chunk = ollama_to_stream_chunk(line).unwrap();
    assert_eq!(chunk.content(), "tide");
    assert!(!*chunk.is_final());

    let done: OllamaGenerateResponse =
        serde_json::from_str(r#"{"model":"llama3","response":"","done":true}"#).unwrap();
    let chunk = ollama_to_stream_chunk(done).unwrap();
    assert!(*chunk.is_final());
    assert_eq!(*chunk.finish_reason(), Some(FinishReason::Stop));
}

#[test]
fn test_ollama_error_field_surfaces() {
    let failed: OllamaGenerateResponse =
        serde_json::from_str(r#"{"error":"model 'x' not found"}"#).unwrap();
    let err = from_ollama_response(failed).unwrap_err();
    assert!(format!("{}", err).contains("not found"));
}
