#[actix_web::main]
async fn main() -> std::io::Result<()> {
    llm_relay_lib::run().await
}
