#[actix_web::main]
async fn main() -> std::io::Result<()> {
    training_report_server::run().await
}
