use ballot_common::cache::{CacheHandle, NoopCache};
use ballot_common::db;
use ballot_common::email::senders::{FallbackSender, MockSender, SmtpSender};
use ballot_common::email::{EmailSender, SendEmail};
use ballot_common::gateway::{GatewayClient, MockGateway, PaymentGateway, PaystackClient};

use actix_web::web::Data;
use actix_web::{App, HttpServer};
use flexi_logger::{
    Age, Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming, WriteMode,
};
use std::sync::Arc;

mod env;
mod handlers;
mod middleware;
mod services;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let mut port = 9000u16;

    let mut args = std::env::args();

    // Eat the first argument, which is the relative path to the executable
    args.next();

    while let Some(arg) = args.next() {
        match arg.to_lowercase().as_str() {
            "--port" => {
                let port_str = {
                    let next_arg = args.next();

                    match next_arg {
                        Some(s) => s,
                        None => {
                            eprintln!("ERROR: --port option specified but no port was given");
                            std::process::exit(1);
                        }
                    }
                };

                port = {
                    let port_result = port_str.parse::<u16>();

                    match port_result {
                        Ok(p) => p,
                        Err(_) => {
                            eprintln!("ERROR: Incorrect format for port. Integer expected");
                            std::process::exit(1);
                        }
                    }
                };

                continue;
            }
            a => {
                eprintln!("ERROR: Invalid argument: {}", &a);
                std::process::exit(1);
            }
        }
    }

    let base_addr = format!("127.0.0.1:{}", &port);

    let _logger = Logger::try_with_str(&env::CONF.log_level)
        .expect("Invalid log level")
        .log_to_file(FileSpec::default().directory("./logs"))
        .rotate(
            Criterion::Age(Age::Day),
            Naming::Timestamps,
            Cleanup::KeepLogAndCompressedFiles(60, 365),
        )
        .cleanup_in_background_thread(true)
        .duplicate_to_stdout(Duplicate::All)
        .write_mode(WriteMode::Async)
        .format(|writer, now, record| {
            write!(
                writer,
                "{:5} | {} | {}:{} | {}",
                record.level(),
                now.format("%Y-%m-%dT%H:%M:%S%.6fZ"),
                record.module_path().unwrap_or("<unknown>"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .use_utc()
        .start()
        .expect("Failed to start logger");

    log::info!("Connecting to database...");

    let db_uri = format!(
        "postgres://{}:{}@{}:{}/{}",
        env::CONF.db_username,
        env::CONF.db_password,
        env::CONF.db_hostname,
        env::CONF.db_port,
        env::CONF.db_name,
    );

    // To prevent resource starvation, max connections must be at least as
    // large as the number of actix workers
    let db_max_connections = std::cmp::max(
        env::CONF.db_max_connections,
        env::CONF.actix_worker_count as u32,
    );

    let db_thread_pool =
        match db::create_db_thread_pool(&db_uri, db_max_connections, env::CONF.db_idle_timeout) {
            Ok(p) => p,
            Err(_) => {
                eprintln!("ERROR: Failed to connect to database");
                std::process::exit(1);
            }
        };

    log::info!("Successfully connected to database");

    let smtp_sender: Box<dyn SendEmail> = if env::CONF.email_enabled {
        log::info!("Connecting to SMTP relay...");

        let mut transports: Vec<Box<dyn SendEmail>> = Vec::new();

        let primary = SmtpSender::with_credentials(
            &env::CONF.smtp_username,
            &env::CONF.smtp_key,
            &env::CONF.smtp_address,
            env::CONF.max_smtp_connections,
            env::CONF.smtp_idle_timeout,
        )
        .expect("Failed to connect to SMTP relay");

        match primary.test_connection().await {
            Ok(true) => (),
            Ok(false) => panic!("Failed to connect to SMTP relay"),
            Err(e) => panic!("Failed to connect to SMTP relay: {e}"),
        }

        transports.push(Box::new(primary));

        if let (Some(address), Some(username), Some(key)) = (
            env::CONF.smtp_fallback_address.as_ref(),
            env::CONF.smtp_fallback_username.as_ref(),
            env::CONF.smtp_fallback_key.as_ref(),
        ) {
            let fallback = SmtpSender::with_credentials(
                username,
                key,
                address,
                env::CONF.max_smtp_connections,
                env::CONF.smtp_idle_timeout,
            )
            .expect("Failed to configure fallback SMTP relay");

            transports.push(Box::new(fallback));
        }

        log::info!("Successfully connected to SMTP relay");

        Box::new(FallbackSender::new(transports))
    } else {
        log::info!("Emails are disabled. Using mock SMTP thread pool.");
        Box::new(MockSender::new())
    };

    let smtp_sender: EmailSender = Arc::new(smtp_sender);

    let gateway_client: Box<dyn PaymentGateway> = if env::CONF.gateway_enabled {
        let client = PaystackClient::new(
            &env::CONF.gateway_base_url,
            &env::CONF.gateway_secret_key,
            env::CONF.gateway_callback_url.clone(),
            env::CONF.gateway_timeout,
        )
        .expect("Failed to construct payment gateway client");

        Box::new(client)
    } else {
        log::info!("Payment gateway is disabled. Using mock gateway.");
        Box::new(MockGateway::new())
    };

    let gateway_client: GatewayClient = Arc::new(gateway_client);

    let cache: CacheHandle = Arc::new(Box::new(NoopCache::new()));

    HttpServer::new(move || {
        App::new()
            .app_data(Data::new(db_thread_pool.clone()))
            .app_data(Data::new(smtp_sender.clone()))
            .app_data(Data::new(gateway_client.clone()))
            .app_data(Data::new(cache.clone()))
            .configure(services::api::configure)
            .wrap(actix_web::middleware::Logger::default())
    })
    .workers(env::CONF.actix_worker_count)
    .bind(base_addr)?
    .run()
    .await?;

    // All worker threads have been joined; the config is no longer shared
    unsafe { env::CONF.zeroize() };

    Ok(())
}
