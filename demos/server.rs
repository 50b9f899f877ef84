//
//  Sample application.
//
//  Listens on localhost:4918, plain http, no ssl.
//  Connect to http://localhost:4918/
//

use std::convert::Infallible;
use std::error::Error;
use std::net::SocketAddr;
use std::str::FromStr;

use clap::Parser;
use futures_util::future::TryFutureExt;
use headers::{authorization::Basic, Authorization, HeaderMapExt};

use dav_engine::{body::Body, Access, DavHandler, DavMethod, DavPath, MemStore};

#[derive(Clone)]
struct Server {
    dh: DavHandler,
}

impl Server {
    pub fn new(prefix: String, read_only: bool, auth: bool, autoindex: bool) -> Self {
        let mut config = DavHandler::builder(MemStore::new())
            .strip_prefix(prefix)
            .read_only(read_only)
            .autoindex(autoindex)
            .principal("anonymous");
        if auth {
            // any user will do, as long as there is one.
            config = config.authorizer(
                |req: &http::Request<()>, _method: DavMethod, _path: &DavPath| {
                    match req.headers().typed_get::<Authorization<Basic>>() {
                        Some(_) => Access::Allow,
                        None => Access::RequireAuth("dav-engine".to_string()),
                    }
                },
            );
        }
        Server { dh: config.build() }
    }

    async fn handle(
        &self,
        req: hyper::Request<hyper::Body>,
    ) -> Result<hyper::Response<Body>, Infallible> {
        let user = req
            .headers()
            .typed_get::<Authorization<Basic>>()
            .map(|Authorization(basic)| basic.username().to_string());
        Ok(self.dh.handle_with(req, None, user).await)
    }
}

#[derive(Debug, clap::Parser)]
#[command(about, version)]
struct Cli {
    /// port to listen on
    #[arg(short, long, default_value = "4918")]
    port: u16,
    /// url prefix to strip
    #[arg(long, default_value = "")]
    prefix: String,
    /// refuse every method that changes the store
    #[arg(short, long)]
    read_only: bool,
    /// require basic authentication
    #[arg(short, long)]
    auth: bool,
    /// html index for collections
    #[arg(short = 'i', long)]
    autoindex: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let Cli {
        port,
        prefix,
        read_only,
        auth,
        autoindex,
    } = Cli::parse();

    let dav_server = Server::new(prefix, read_only, auth, autoindex);
    let make_service = hyper::service::make_service_fn(|_| {
        let dav_server = dav_server.clone();
        async move {
            let func = move |req| {
                let dav_server = dav_server.clone();
                async move { dav_server.handle(req).await }
            };
            Ok::<_, hyper::Error>(hyper::service::service_fn(func))
        }
    });

    let addr = format!("0.0.0.0:{}", port);
    let addr = SocketAddr::from_str(&addr)?;

    let server = hyper::Server::try_bind(&addr)?
        .serve(make_service)
        .map_err(|e| eprintln!("server error: {}", e));

    println!("Serving memory store on {}", port);
    let _ = server.await;
    Ok(())
}
