use elevatorpeer::{elevator_logic, init, print};


#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let cfg = match init::parse_args(&args)? {
        init::StartMode::Help => {
            init::print_help();
            return Ok(());
        }
        init::StartMode::Run(cfg) => cfg,
    };

    print::info(format!(
        "Startar node {} av {} ({} etasjar), heisserver {}",
        cfg.index,
        cfg.node_count(),
        cfg.num_floors,
        cfg.elevator_addr
    ));

    elevator_logic::run(cfg).await
}
