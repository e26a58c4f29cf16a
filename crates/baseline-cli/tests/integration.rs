#![allow(deprecated)]
use assert_cmd::Command;
use baseline_cli::catalog::{self, CatalogInput};
use baseline_cli::templates::template_store;
use baseline_core::action::{ActionOutcome, ActionRunner};
use baseline_core::config::PipelineConfig;
use baseline_core::environment::Environment;
use baseline_core::mutation::ProjectTree;
use baseline_core::sequencer::{RunReport, RunState, Sequencer, StepStatus};
use baseline_core::settings::Settings;
use baseline_core::ErrorKind;
use predicates::prelude::*;
use std::cell::RefCell;
use std::path::Path;
use tempfile::TempDir;

fn baseline(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("baseline").unwrap();
    cmd.current_dir(dir.path()).env("BASELINE_ROOT", dir.path());
    cmd
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn read(root: &Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel)).unwrap_or_else(|e| panic!("{rel}: {e}"))
}

const ERROR_PAGE: &str = "<!DOCTYPE html>
<html>
<head>
  <title>We're sorry, but something went wrong</title>
  <style>body { color: #666; }</style> <!-- inline note -->
</head>
<body>
  <!-- This file lives in public/500.html -->
  <div class=\"dialog\">Something went wrong.</div>
</body>
</html>
";

/// The files a freshly generated application ships with.
fn skeleton(root: &Path) {
    write(root, "Gemfile", "source 'https://rubygems.org'\ngem 'rails', '4.1.1'\n");
    write(
        root,
        "config/application.rb",
        "require File.expand_path('../boot', __FILE__)

require 'rails/all'

module Storefront
  class Application < Rails::Application
    # Settings in config/environments/* take precedence over those specified here.
  end
end
",
    );
    write(
        root,
        "config/routes.rb",
        "Rails.application.routes.draw do
  # The priority is based upon order of creation: first created -> highest priority.
  # root 'welcome#index'
end
",
    );
    write(
        root,
        "config/environments/development.rb",
        "Rails.application.configure do
  config.cache_classes = false
  config.action_mailer.raise_delivery_errors = false
end
",
    );
    write(
        root,
        "config/environments/test.rb",
        "Rails.application.configure do\n  config.cache_classes = true\nend\n",
    );
    write(
        root,
        "config/environments/production.rb",
        "Rails.application.configure do
  config.cache_classes = true
  config.serve_static_assets = false
end
",
    );
    write(root, "config/locales/en.yml", "en:\n  hello: \"Hello world\"\n");
    write(
        root,
        "app/assets/javascripts/application.js",
        "//= require jquery\n//= require turbolinks\n//= require_tree .\n",
    );
    write(root, "app/assets/stylesheets/application.css", "/*\n *= require_self\n */\n");
    for page in ["500", "404", "422"] {
        write(root, &format!("public/{page}.html"), ERROR_PAGE);
    }
    write(
        root,
        "Rakefile",
        "require File.expand_path('../config/application', __FILE__)\n\nRails.application.load_tasks\n",
    );
    write(root, ".gitignore", "/tmp\n");
}

/// Stands in for the generators: records every call and produces the
/// files later steps anchor on. Fails any command containing `failing`.
#[derive(Default)]
struct GeneratorDouble {
    failing: Option<&'static str>,
    calls: RefCell<Vec<String>>,
}

impl ActionRunner for GeneratorDouble {
    fn invoke(&self, command: &str, args: &[String], dir: &Path) -> baseline_core::Result<ActionOutcome> {
        let line = format!("{command} {}", args.join(" "));
        self.calls.borrow_mut().push(line.clone());
        if self.failing.is_some_and(|f| line.contains(f)) {
            return Ok(ActionOutcome {
                exit_code: 1,
                stdout: "generator blew up".into(),
            });
        }
        if line.ends_with("rspec:install") {
            write(dir, "spec/spec_helper.rb", "# generated by rspec\n");
        }
        if line.ends_with("devise:install") {
            write(
                dir,
                "config/initializers/devise.rb",
                "Devise.setup do |config|\n  config.mailer_sender = 'please-change-me@example.com'\nend\n",
            );
            write(dir, "config/locales/devise.en.yml", "en:\n  devise: {}\n");
        }
        Ok(ActionOutcome {
            exit_code: 0,
            stdout: String::new(),
        })
    }
}

fn run_catalog(root: &Path, settings: Settings, runner: &GeneratorDouble) -> (CatalogInput, RunReport) {
    let input = CatalogInput::new("storefront", &PipelineConfig::default(), settings);
    let steps = catalog::steps(&input).unwrap();
    let tree = ProjectTree::new(root);
    let templates = template_store(&[]);
    let context = input.context();
    let report = Sequencer::new(&tree, &templates, &context, runner).run(&steps);
    (input, report)
}

// ---------------------------------------------------------------------------
// full catalog through the library
// ---------------------------------------------------------------------------

#[test]
fn full_catalog_applies_to_skeleton() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    skeleton(root);
    let runner = GeneratorDouble::default();
    let settings = Settings::from_pairs([("GITHUB_KEY", "gh-key"), ("GITHUB_SECRET", "gh-secret")]);

    let (input, report) = run_catalog(root, settings, &runner);
    if let Some(failure) = &report.failure {
        panic!("{failure}");
    }
    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.succeeded(), report.steps.len());

    assert!(read(root, "Gemfile").contains("ruby '2.1.2'"));
    assert_eq!(read(root, ".ruby-version").trim(), "2.1.2");
    assert!(read(root, "README.md").contains("storefront"));
    assert!(read(root, "MIT-LICENSE.md").contains("Storefront"));

    let development = read(root, "config/environments/development.rb");
    assert!(development.contains("raise_delivery_errors = true"));
    assert!(development.contains("action_on_unpermitted_parameters = :raise"));

    let application = read(root, "config/application.rb");
    assert!(application.contains("generate.test_framework :rspec"));
    assert!(application.contains("config.active_record.default_timezone = :utc"));
    assert!(application.contains("config.i18n.enforce_available_locales = true"));
    assert!(application.contains("config.i18n.default_locale = 'pt-BR'"));

    let routes = read(root, "config/routes.rb");
    assert!(!routes.contains("The priority"));
    assert!(routes.contains("devise_for :users"));
    assert!(routes.contains("root to: 'high_voltage/pages#show', id: 'home'"));

    let devise = read(root, "config/initializers/devise.rb");
    assert!(devise.contains("config.omniauth :github"));
    assert!(!devise.contains("config.omniauth :twitter"));
    assert!(devise.trim_end().ends_with("end"));

    for env in Environment::ALL {
        let content = read(root, &format!("config/environments/{env}.rb"));
        assert_eq!(content.matches("ENV['GITHUB_KEY']      = 'fake'").count(), 1, "{env}");
    }

    let staging = read(root, "config/environments/staging.rb");
    assert!(staging.starts_with("require Rails.root.join('config/environments/production')"));
    assert!(staging.contains("Storefront::Application.configure do"));

    for env in [Environment::Test, Environment::Development] {
        let token = &input.secret_tokens[&env];
        let content = read(root, &format!("config/environments/{env}.rb"));
        assert!(content.contains(&format!("ENV['SECRET_KEY_BASE'] = '{token}'")), "{env}");
    }
    assert!(!read(root, "config/environments/production.rb").contains("SECRET_KEY_BASE"));
    assert!(read(root, "config/initializers/secret_token.rb").contains("Storefront::Application.config"));

    let production = read(root, "config/environments/production.rb");
    assert!(production.contains("config.serve_static_assets = false\n\n  # Enable deflate"));

    assert!(!read(root, "app/assets/javascripts/application.js").contains("turbolinks"));
    assert!(!root.join("app/assets/stylesheets/application.css").exists());
    assert!(root.join("app/assets/stylesheets/application.css.scss").is_file());
    assert!(root.join("app/models/oauth/github.rb").is_file());
    assert!(root.join("spec/support/database_cleaner.rb").is_file());
    assert!(root.join("spec/support/omniauth.rb").is_file());
    assert!(root.join("spec/support/shared_examples/.keep").is_file());
    assert!(root.join("spec/features/.keep").is_file());
    assert!(read(root, ".gitignore").len() > "/tmp\n".len());
    assert!(read(root, "Rakefile").ends_with("task(:default).clear\ntask :default => [:spec]\n"));
    assert_ne!(read(root, "spec/spec_helper.rb"), "# generated by rspec\n");

    let calls = runner.calls.borrow();
    assert_eq!(calls.first().map(String::as_str), Some("bundle exec rails generate rspec:install"));
    assert_eq!(calls.last().map(String::as_str), Some("bundle exec rake db:create db:migrate"));
    assert!(calls.contains(&"git init".to_string()));
}

#[test]
fn error_pages_get_meta_tags_and_lose_comments() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    skeleton(root);
    let (_, report) = run_catalog(root, Settings::default(), &GeneratorDouble::default());
    assert!(report.failure.is_none());

    for page in ["500", "404", "422"] {
        let content = read(root, &format!("public/{page}.html"));
        assert!(
            content.contains(
                "<head>\n  <meta charset='utf-8' />\n  <meta name='ROBOTS' content='NOODP' />\n  <title>"
            ),
            "{page}: {content}"
        );
        assert!(!content.contains("<!--"), "{page}");
        assert!(content.contains("  <style>body { color: #666; }</style>\n</head>"), "{page}: {content}");
        assert!(content.contains("Something went wrong."));
    }
}

#[test]
fn each_environment_gets_its_own_mailer_host() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    skeleton(root);
    let settings = Settings::from_pairs([("PRODUCTION_HOST", "storefront.example.org")]);
    let (input, report) = run_catalog(root, settings, &GeneratorDouble::default());
    assert!(report.failure.is_none());

    let expected = [
        (Environment::Development, "storefront.local"),
        (Environment::Test, "www.example.com"),
        (Environment::Staging, "staging.storefront.com"),
        (Environment::Production, "storefront.example.org"),
    ];
    for (env, host) in expected {
        assert_eq!(input.hosts[&env], host);
        let content = read(root, &format!("config/environments/{env}.rb"));
        let line = format!("config.action_mailer.default_url_options = {{ host: '{host}' }}");
        assert_eq!(content.matches(&line).count(), 1, "{env}");
        assert_eq!(content.matches("default_url_options").count(), 1, "{env}");
        assert!(content.trim_end().ends_with("}\nend"), "{env}: {content}");
    }
}

#[test]
fn failing_generator_aborts_and_keeps_earlier_steps() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    skeleton(root);
    let runner = GeneratorDouble {
        failing: Some("foundation:install"),
        ..Default::default()
    };
    let (_, report) = run_catalog(root, Settings::default(), &runner);

    assert_eq!(report.state, RunState::Aborted);
    let failure = report.failure.as_ref().unwrap();
    assert_eq!(failure.step, "generate_foundation");
    assert_eq!(failure.kind(), ErrorKind::ExternalActionFailed);

    let status = |name: &str| report.steps.iter().find(|s| s.name == name).unwrap().status;
    assert_eq!(status("setup_user_auth"), StepStatus::Succeeded);
    assert_eq!(status("generate_foundation"), StepStatus::Failed);
    assert_eq!(status("setup_smtp"), StepStatus::Pending);

    assert!(root.join("app/models/user.rb").is_file());
    assert!(!root.join("config/smtp.yml").exists());
    assert!(!runner.calls.borrow().iter().any(|c| c == "git init"));
}

#[test]
fn missing_environment_file_names_the_environment() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    skeleton(root);
    std::fs::remove_file(root.join("config/environments/test.rb")).unwrap();

    let (_, report) = run_catalog(root, Settings::default(), &GeneratorDouble::default());
    let failure = report.failure.unwrap();
    assert_eq!(failure.step, "generate_devise");
    assert_eq!(failure.kind(), ErrorKind::FileNotFound);
    assert_eq!(failure.error.environment(), Some(Environment::Test));

    // development precedes test and was already edited; staging was not.
    assert!(read(root, "config/environments/development.rb").contains("'fake'"));
    assert!(!read(root, "config/environments/staging.rb").contains("'fake'"));
}

// ---------------------------------------------------------------------------
// baseline steps
// ---------------------------------------------------------------------------

#[test]
fn steps_lists_catalog_in_order() {
    let dir = TempDir::new().unwrap();
    let output = baseline(&dir).arg("steps").assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8(output).unwrap();

    let first = stdout.find("replace_gemfile").unwrap();
    let routes = stdout.find("remove_routes_comment_lines").unwrap();
    let auth = stdout.find("setup_user_auth").unwrap();
    let last = stdout.find("create_database").unwrap();
    assert!(first < routes && routes < auth && auth < last);
}

#[test]
fn steps_json_describes_operations() {
    let dir = TempDir::new().unwrap();
    let output = baseline(&dir)
        .args(["steps", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let steps: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let steps = steps.as_array().unwrap();

    assert_eq!(steps[0]["index"], 1);
    assert_eq!(steps[0]["name"], "replace_gemfile");
    assert_eq!(steps[0]["operations"][0], "remove Gemfile");
    assert_eq!(steps.last().unwrap()["name"], "create_database");
}

// ---------------------------------------------------------------------------
// baseline run
// ---------------------------------------------------------------------------

#[test]
fn dry_run_prints_plan_without_writing() {
    let dir = TempDir::new().unwrap();
    baseline(&dir)
        .args(["run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains(" 1. replace_gemfile"))
        .stdout(predicate::str::contains("render Gemfile -> Gemfile"));

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn run_on_empty_directory_stops_at_first_missing_file() {
    let dir = TempDir::new().unwrap();
    baseline(&dir)
        .arg("run")
        .assert()
        .failure()
        .stdout(predicate::str::contains("  applied: readme"))
        .stderr(predicate::str::contains("error: step 'raise_on_delivery_errors' failed"))
        .stderr(predicate::str::contains("file not found"))
        .stderr(predicate::str::contains("(3/"));

    assert!(dir.path().join("README.md").is_file());
    assert!(dir.path().join("Gemfile").is_file());
    assert!(!dir.path().join("config").exists());
}

#[test]
fn explicit_missing_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    baseline(&dir)
        .args(["--config", "nope.yaml", "steps"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn config_errors_are_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("baseline.yaml"), "app_name: \"  \"\n").unwrap();
    baseline(&dir)
        .arg("steps")
        .assert()
        .failure()
        .stderr(predicate::str::contains("app_name is empty"));
}

#[test]
fn configured_ruby_version_is_rendered() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("baseline.yaml"), "ruby_version: 2.3.0\n").unwrap();
    baseline(&dir).arg("run").assert().failure();
    assert_eq!(read(dir.path(), ".ruby-version").trim(), "2.3.0");
}
