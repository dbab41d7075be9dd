use contactflow_rust::cli::{parse_args, run, Outcome};
use contactflow_rust::DataClient;

#[tokio::main]
async fn main() {
    // Cargar .env si existe (DATABASE_URL, CONTACTS_IN_MEMORY, RUST_LOG)
    let _ = dotenvy::dotenv();
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[contactflow] {e}");
            std::process::exit(e.exit_code());
        }
    };
    let client = match DataClient::live() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[contactflow] no se pudo abrir el almacenamiento: {e}");
            std::process::exit(e.exit_code());
        }
    };
    match run(&client, command).await {
        Ok(Outcome::Lines(lines)) => {
            for line in lines {
                println!("{line}");
            }
        }
        Ok(Outcome::NotFound(id)) => {
            eprintln!("[contactflow] contacto no encontrado: {id}");
            std::process::exit(4);
        }
        Err(e) => {
            eprintln!("[contactflow] error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
