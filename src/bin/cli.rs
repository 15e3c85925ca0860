use anyhow::{bail, Context, Result};
use chartboard::models::{
    CreateDashboardRequest, CreateDashboardResponse, Dashboard, DashboardConfig,
    DashboardWithDataset, Dataset, DatasetWithUrl, UpdateDashboardRequest, UploadDatasetRequest,
    UploadDatasetResponse,
};
use chartboard::user_models::{IdentityProfile, SignInResponse, User};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use prettytable::{Cell, Row, Table};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const SESSION_FILE: &str = ".chartboard-session";

#[derive(Parser)]
#[command(name = "chartboard")]
#[command(about = "A CLI client for chartboard datasets and dashboards", long_about = None)]
struct Cli {
    #[arg(long, env = "CHARTBOARD_URL", default_value = "http://localhost:3000", help = "Server URL")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Sign in with an external identity (identity broker only)")]
    Login {
        #[arg(long, help = "External identity id")]
        open_id: String,

        #[arg(long, help = "Display name")]
        name: Option<String>,

        #[arg(long, help = "Email address")]
        email: Option<String>,

        #[arg(long, env = "CHARTBOARD_IDENTITY_SECRET", hide_env_values = true, help = "Identity broker secret")]
        identity_secret: String,
    },

    #[command(about = "Sign out")]
    Logout,

    #[command(about = "Show the signed-in user")]
    Whoami,

    #[command(about = "Upload a CSV file as a new dataset")]
    Upload {
        #[arg(short, long, help = "Path to the CSV file")]
        file: String,

        #[arg(short, long, help = "Dataset name")]
        name: String,

        #[arg(short, long, help = "Optional description")]
        description: Option<String>,
    },

    #[command(about = "List your datasets")]
    Datasets,

    #[command(about = "Show one dataset")]
    Dataset { id: i64 },

    #[command(about = "Delete a dataset (dashboards bound to it are kept)")]
    DeleteDataset { id: i64 },

    #[command(about = "List your dashboards")]
    Dashboards,

    #[command(about = "Show one dashboard")]
    Dashboard { id: i64 },

    #[command(about = "Create a dashboard from a JSON config file")]
    CreateDashboard {
        #[arg(long, help = "Dataset the dashboard is bound to")]
        dataset_id: i64,

        #[arg(short, long, help = "Dashboard name")]
        name: String,

        #[arg(short, long, help = "Optional description")]
        description: Option<String>,

        #[arg(short, long, help = "Path to a JSON file with {title, theme, charts}")]
        config: String,
    },

    #[command(about = "Replace a dashboard's config with a JSON config file")]
    UpdateDashboard {
        id: i64,

        #[arg(short, long, help = "Path to a JSON file with {title, theme, charts}")]
        config: String,
    },

    #[command(about = "Delete a dashboard")]
    DeleteDashboard { id: i64 },
}

#[derive(Debug, Serialize, Deserialize)]
struct Session {
    server: String,
    token: String,
    user_id: i64,
}

impl Session {
    fn save(&self) -> Result<()> {
        let json = serde_json::to_string(self)?;
        fs::write(SESSION_FILE, json)?;
        Ok(())
    }

    fn load() -> Option<Self> {
        if Path::new(SESSION_FILE).exists() {
            let data = fs::read_to_string(SESSION_FILE).ok()?;
            serde_json::from_str(&data).ok()
        } else {
            None
        }
    }

    fn clear() -> Result<()> {
        if Path::new(SESSION_FILE).exists() {
            fs::remove_file(SESSION_FILE)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct Client {
    http: reqwest::Client,
    server: String,
    token: Option<String>,
}

impl Client {
    fn new(server: String, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            server: server.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server, path)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.authed(self.http.get(self.url(path))).send().await?;
        decode(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .authed(self.http.post(self.url(path)))
            .json(body)
            .send()
            .await?;
        decode(response).await
    }

    async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .authed(self.http.put(self.url(path)))
            .json(body)
            .send()
            .await?;
        decode(response).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let response = self.authed(self.http.delete(self.url(path))).send().await?;
        let _: serde_json::Value = decode(response).await?;
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await?;
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => bail!("{} ({})", body.error.message, body.error.code),
            Err(_) => bail!("Request failed with {}: {}", status, text),
        }
    }
    Ok(response.json().await?)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run_command(cli.server, cli.command).await {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_command(server: String, command: Commands) -> Result<()> {
    match command {
        Commands::Login {
            open_id,
            name,
            email,
            identity_secret,
        } => login(server, open_id, name, email, identity_secret).await,
        Commands::Logout => logout(server).await,
        Commands::Whoami => whoami(&client(server)).await,
        Commands::Upload {
            file,
            name,
            description,
        } => upload(&require_login(server)?, file, name, description).await,
        Commands::Datasets => list_datasets(&require_login(server)?).await,
        Commands::Dataset { id } => show_dataset(&require_login(server)?, id).await,
        Commands::DeleteDataset { id } => {
            let client = require_login(server)?;
            client.delete(&format!("/api/datasets/{id}")).await?;
            println!("✅ Dataset {} deleted", id);
            Ok(())
        }
        Commands::Dashboards => list_dashboards(&require_login(server)?).await,
        Commands::Dashboard { id } => show_dashboard(&require_login(server)?, id).await,
        Commands::CreateDashboard {
            dataset_id,
            name,
            description,
            config,
        } => {
            let client = require_login(server)?;
            let request = CreateDashboardRequest {
                dataset_id,
                name,
                description,
                config: read_config(&config)?,
            };
            let response: CreateDashboardResponse =
                client.post("/api/dashboards", &request).await?;
            println!("✅ {}", response.message);
            println!("   ID: {}", response.id);
            Ok(())
        }
        Commands::UpdateDashboard { id, config } => {
            let client = require_login(server)?;
            let request = UpdateDashboardRequest {
                config: read_config(&config)?,
            };
            let _: serde_json::Value = client
                .put(&format!("/api/dashboards/{id}"), &request)
                .await?;
            println!("✅ Dashboard {} updated", id);
            Ok(())
        }
        Commands::DeleteDashboard { id } => {
            let client = require_login(server)?;
            client.delete(&format!("/api/dashboards/{id}")).await?;
            println!("✅ Dashboard {} deleted", id);
            Ok(())
        }
    }
}

fn client(server: String) -> Client {
    let token = Session::load()
        .filter(|s| s.server == server)
        .map(|s| s.token);
    Client::new(server, token)
}

fn require_login(server: String) -> Result<Client> {
    let session = Session::load()
        .filter(|s| s.server == server)
        .ok_or_else(|| anyhow::anyhow!("You must be logged in. Use: chartboard login --open-id <id>"))?;
    Ok(Client::new(server, Some(session.token)))
}

fn read_config(path: &str) -> Result<DashboardConfig> {
    let data = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    serde_json::from_str(&data).with_context(|| format!("{} is not a valid dashboard config", path))
}

fn local_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

async fn login(
    server: String,
    open_id: String,
    name: Option<String>,
    email: Option<String>,
    identity_secret: String,
) -> Result<()> {
    let client = Client::new(server.clone(), Some(identity_secret));
    let profile = IdentityProfile {
        open_id,
        name,
        email,
        login_method: Some("cli".to_string()),
    };
    let response: SignInResponse = client.post("/api/auth/callback", &profile).await?;

    Session {
        server,
        token: response.token,
        user_id: response.user.id,
    }
    .save()?;

    println!("✅ Login successful!");
    println!(
        "👤 Welcome, {}!",
        response.user.name.as_deref().unwrap_or(&response.user.open_id)
    );
    Ok(())
}

async fn logout(server: String) -> Result<()> {
    let client = client(server);
    if client.token.is_some() {
        let _: serde_json::Value = client.post("/api/auth/logout", &()).await?;
    }
    Session::clear()?;
    println!("✅ Logged out successfully!");
    Ok(())
}

async fn whoami(client: &Client) -> Result<()> {
    let user: Option<User> = client.get("/api/auth/me").await?;
    match user {
        Some(user) => {
            println!("👤 Logged in as: {}", user.name.as_deref().unwrap_or("-"));
            println!("🆔 User ID: {}", user.id);
            println!("🔑 Role: {:?}", user.role);
            println!("⏰ Last sign-in: {}", local_time(user.last_signed_in));
        }
        None => {
            println!("❌ Not logged in");
            println!("💡 Use 'chartboard login --open-id <id>' to log in");
        }
    }
    Ok(())
}

async fn upload(
    client: &Client,
    file: String,
    name: String,
    description: Option<String>,
) -> Result<()> {
    let path = Path::new(&file);
    if !path.exists() {
        bail!("File not found: {}", file);
    }
    let file_content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", file))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.csv")
        .to_string();

    let request = UploadDatasetRequest {
        file_name,
        file_content,
        name,
        description,
    };
    let response: UploadDatasetResponse = client.post("/api/datasets", &request).await?;

    println!("✅ {}", response.message);
    println!("   ID: {}", response.id);
    println!("   Rows: {}", response.row_count);
    println!("   Columns: {}", response.columns.join(", "));
    Ok(())
}

async fn list_datasets(client: &Client) -> Result<()> {
    let datasets: Vec<Dataset> = client.get("/api/datasets").await?;
    if datasets.is_empty() {
        println!("📭 No datasets uploaded yet.");
        println!("💡 Use 'chartboard upload -f <file.csv> -n <name>' to add one");
        return Ok(());
    }

    println!("\n📚 Datasets ({})\n", datasets.len());
    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("ID"),
        Cell::new("Name"),
        Cell::new("File"),
        Cell::new("Rows"),
        Cell::new("Columns"),
        Cell::new("Uploaded"),
    ]));
    for dataset in datasets {
        table.add_row(Row::new(vec![
            Cell::new(&dataset.id.to_string()),
            Cell::new(&dataset.name),
            Cell::new(&dataset.file_name),
            Cell::new(&dataset.row_count.to_string()),
            Cell::new(&dataset.columns.len().to_string()),
            Cell::new(&local_time(dataset.created_at)),
        ]));
    }
    table.printstd();
    println!();
    Ok(())
}

async fn show_dataset(client: &Client, id: i64) -> Result<()> {
    let found: DatasetWithUrl = client.get(&format!("/api/datasets/{id}")).await?;
    let dataset = found.dataset;

    println!("📄 {} ({})", dataset.name, dataset.file_name);
    if let Some(description) = &dataset.description {
        println!("   {}", description);
    }
    println!("   Rows: {}", dataset.row_count);
    println!("   Columns: {}", dataset.columns.join(", "));
    println!("   Uploaded: {}", local_time(dataset.created_at));
    println!("   Download: {}", found.download_url);
    Ok(())
}

async fn list_dashboards(client: &Client) -> Result<()> {
    let dashboards: Vec<Dashboard> = client.get("/api/dashboards").await?;
    if dashboards.is_empty() {
        println!("📭 No dashboards yet.");
        return Ok(());
    }

    println!("\n📊 Dashboards ({})\n", dashboards.len());
    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("ID"),
        Cell::new("Name"),
        Cell::new("Dataset"),
        Cell::new("Charts"),
        Cell::new("Updated"),
    ]));
    for dashboard in dashboards {
        table.add_row(Row::new(vec![
            Cell::new(&dashboard.id.to_string()),
            Cell::new(&dashboard.name),
            Cell::new(&dashboard.dataset_id.to_string()),
            Cell::new(&dashboard.config.charts.len().to_string()),
            Cell::new(&local_time(dashboard.updated_at)),
        ]));
    }
    table.printstd();
    println!();
    Ok(())
}

async fn show_dashboard(client: &Client, id: i64) -> Result<()> {
    let found: DashboardWithDataset = client.get(&format!("/api/dashboards/{id}")).await?;
    let dashboard = found.dashboard;

    println!("📊 {} ({:?} theme)", dashboard.config.title, dashboard.config.theme);
    match &found.dataset {
        Some(dataset) => println!("   Dataset: {} (#{})", dataset.name, dataset.id),
        None => println!("   ⚠️  Dataset #{} no longer exists", dashboard.dataset_id),
    }

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("Chart"),
        Cell::new("Type"),
        Cell::new("X"),
        Cell::new("Y"),
    ]));
    for chart in &dashboard.config.charts {
        table.add_row(Row::new(vec![
            Cell::new(&chart.title),
            Cell::new(&format!("{:?}", chart.chart_type).to_lowercase()),
            Cell::new(&chart.x_axis),
            Cell::new(&chart.y_axis),
        ]));
    }
    table.printstd();
    Ok(())
}
