use clap::Parser;
use region_links::config::Preferences;
use region_links::messages::Command;
use region_links::templates::MultiPageSettings;
use region_links::{Error, RegionLinks, Result, Runner};
use url::Url;

mod args;
use args::{Args, CommandArg, OutputArgs, convert_export_mode};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Parse command-line arguments
    let args = Args::parse();

    if let Err(e) = run(args).await {
        ::log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut app = RegionLinks::new();
    if let Some(path) = &args.config {
        app = app.with_config_file(path)?;
    }
    if let Some(dir) = args.storage {
        app = app.with_storage_dir(dir);
    }
    if let Some(secs) = args.idle_timeout {
        app = app.with_idle_timeout(secs);
    }

    match args.command {
        CommandArg::Templates { domain } => list_templates(&app, domain.as_deref()).await,
        CommandArg::Cancel => {
            if app.cancel_job().await? {
                println!("Multi-page extraction cancelled");
            } else {
                println!("No multi-page extraction in progress");
            }
            Ok(())
        }
        CommandArg::Delete { id } => {
            if app.templates().delete(&id).await? {
                println!("Deleted template {}", id);
                Ok(())
            } else {
                Err(Error::TemplateNotFound(id))
            }
        }
        command => {
            // Only a plain visit should start auto-run templates
            let app = app.with_auto_run(matches!(command, CommandArg::Resume { .. }));

            println!("Note: region-links requires a WebDriver server (e.g., ChromeDriver).");
            println!(
                "Set WEBDRIVER_URL environment variable if not using the default http://localhost:4444"
            );

            let mut browser = app.connect().await?;
            let result = drive(&mut browser.runner, command).await;
            if let Err(e) = browser.close().await {
                ::log::warn!("Failed to close WebDriver session: {}", e);
            }
            result
        }
    }
}

fn preferences(output: &OutputArgs) -> Preferences {
    Preferences {
        export_mode: convert_export_mode(output.export),
        clean_urls: output.clean_urls,
        ignore_nested_anchors: !output.include_nested,
    }
}

async fn drive(runner: &mut Runner, command: CommandArg) -> Result<()> {
    match command {
        CommandArg::Select { url, rect, output } => {
            runner.open(&url).await?;
            runner.session().start_selection(preferences(&output));
            runner.session().complete_selection(rect).await?;
        }
        CommandArg::Run {
            url,
            template,
            auto,
        } => {
            let domain = Url::parse(&url)?.host_str().unwrap_or_default().to_string();
            let found = runner
                .session()
                .templates()
                .find(Some(&domain), &template)
                .await?;
            let found = found.ok_or(Error::TemplateNotFound(template))?;

            runner.open(&url).await?;
            runner
                .dispatch(Command::RunTemplate {
                    template: found,
                    auto_run: Some(auto),
                })
                .await?;
            runner.watch().await?;
        }
        CommandArg::Save {
            url,
            rect,
            name,
            auto_run,
            output,
            multi_page,
            max_pages,
            pagination_selector,
            full_list,
            auto_scroll,
        } => {
            runner.open(&url).await?;
            let session = runner.session();
            session.start_selection(preferences(&output));
            session.complete_selection(rect).await?;

            let settings = MultiPageSettings {
                multi_page: Some(multi_page),
                max_pages,
                pagination_selector,
                use_container_instead_of_viewport: Some(full_list),
                container_selector: None,
                auto_scroll: Some(auto_scroll),
                max_scroll_steps: None,
            };
            let template = session.save_template(&name, auto_run, settings).await?;
            println!("Saved template {} ({})", template.name, template.id);
        }
        CommandArg::Resume { url } => {
            runner.open(&url).await?;
            runner.watch().await?;
        }
        CommandArg::Templates { .. } | CommandArg::Delete { .. } | CommandArg::Cancel => {}
    }
    Ok(())
}

async fn list_templates(app: &RegionLinks, domain: Option<&str>) -> Result<()> {
    let store = app.templates();
    let templates = match domain {
        Some(domain) => store.for_domain(domain).await?,
        None => store.all().await?,
    };

    if templates.is_empty() {
        println!("No templates saved");
    }
    for template in templates {
        let mut flags = Vec::new();
        if template.auto_run {
            flags.push("auto-run".to_string());
        }
        if template.multi_page {
            flags.push(if template.is_list_mode() {
                "list".to_string()
            } else {
                format!("{} pages", template.max_pages)
            });
        }
        if let Some(selector) = template.active_container() {
            flags.push(format!("container {}", selector));
        }
        println!(
            "{}\t{}\t{}\t{}",
            template.id,
            template.name,
            template.domain,
            flags.join(", ")
        );
    }
    Ok(())
}
