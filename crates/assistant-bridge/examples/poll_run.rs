use assistant_bridge::observability::init_observability;
use assistant_bridge::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), BridgeError> {
    init_observability();
    let assistant_id = std::env::var("ASSISTANT_ID")
        .map_err(|_| BridgeError::Config("set ASSISTANT_ID to run this demo".into()))?;
    let client = AssistantClient::from_env()?;

    let thread = client.create_thread().await?;
    client.add_message(&thread.id, "Give me one fun fact.").await?;
    let run = client.create_run(&thread.id, &assistant_id).await?;

    let mut result = client.poll_run(&thread.id, &run.id).await?;
    while let RunStepResult::FunctionCalls(handle) = &result {
        let call = &handle.tool_calls()[0];
        eprintln!("tool call {} {}", call.function_name, call.arguments);
        result = handle
            .submit_output_and_poll(&client, &client.poller(), &call.call_id, "{}")
            .await?;
    }
    if let RunStepResult::Message(text) = result {
        println!("{text}");
    }
    Ok(())
}
