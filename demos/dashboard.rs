use wardlink::{
    filter::{severity_at_least, Filtered},
    Alert, Severity, StreamClient,
};

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let endpoint = std::env::var("WARDLINK_ENDPOINT")
        .unwrap_or_else(|_| "ws://127.0.0.1:7777/stream".to_string());

    let token = std::env::var("WARDLINK_TOKEN")
        .map_err(|_| {
            println!("No WARDLINK_TOKEN env var or invalid");
            std::process::exit(1);
        })
        .unwrap();

    let client = StreamClient::new(&endpoint).unwrap();

    client.set_handler(Filtered::new(
        severity_at_least(Severity::Warning),
        |alert: Alert| async move {
            println!(
                "[{}] {} (patient {}, rule {})",
                alert.severity, alert.title, alert.patient_id, alert.rule_key
            );
        },
    ));

    client.start(Some(&token), true);

    let mut states = client.watch_state();
    loop {
        states.changed().await.unwrap();
        log::info!("Connection state: {}", *states.borrow());
    }
}
