use assistant_bridge::observability::init_observability;
use assistant_bridge::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), BridgeError> {
    init_observability();
    let assistant_id = std::env::var("ASSISTANT_ID")
        .map_err(|_| BridgeError::Config("set ASSISTANT_ID to run this demo".into()))?;
    let client = AssistantClient::from_env()?;

    let mut stream = client
        .create_and_stream_run(&assistant_id, "Say hello, then tell me the time in Tokyo.")
        .await?;

    while let Some(event) = stream.next_event().await {
        match event? {
            RunStatusEvent::ThreadCreated(id) => eprintln!("thread: {id}"),
            RunStatusEvent::MessageDelta(text) => print!("{text}"),
            RunStatusEvent::MessageCompleted(_) => println!(),
            RunStatusEvent::RunRequiresAction(handle) => {
                let Some(call) = handle.tool_calls().first() else {
                    break;
                };
                eprintln!("tool call {} {}", call.function_name, call.arguments);
                stream = handle
                    .submit_output(&client, &call.call_id, "12:00")
                    .await?;
            }
            RunStatusEvent::RunFailed(run) | RunStatusEvent::RunExpired(run) => {
                eprintln!("run {} ended: {}", run.id, run.status);
            }
            RunStatusEvent::ErrorOccurred(error) => eprintln!("stream error: {}", error.message),
            _ => {}
        }
    }
    Ok(())
}
