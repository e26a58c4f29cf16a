//! The application-baseline step list.
//!
//! Order matters and is fixed here by hand. Anchors a step relies on must
//! exist when it runs, so:
//! - route comments are collapsed before any route is injected
//! - the staging environment file exists before any per-environment edit
//! - `rspec:install` runs before `spec_helper.rb` is replaced
//! - `devise:install` runs before the devise initializer is edited

use std::collections::BTreeMap;

use baseline_core::action::ExternalAction;
use baseline_core::anchor::Anchor;
use baseline_core::config::PipelineConfig;
use baseline_core::environment::{Environment, EnvironmentContexts, EnvironmentEdit, Placement};
use baseline_core::mutation::Replacement;
use baseline_core::settings::Settings;
use baseline_core::step::Step;
use baseline_core::template::{Context, Fragment};
use baseline_core::Result;
use chrono::Datelike;
use rand::distributions::Alphanumeric;
use rand::Rng;

const APPLICATION_RB: &str = "config/application.rb";
const ROUTES_RB: &str = "config/routes.rb";
const DEVELOPMENT_RB: &str = "config/environments/development.rb";
const PRODUCTION_RB: &str = "config/environments/production.rb";
const STAGING_RB: &str = "config/environments/staging.rb";
const DEVISE_INITIALIZER: &str = "config/initializers/devise.rb";

const APPLICATION_CLASS: &str = r"(?m)^[ \t]*class Application < Rails::Application[ \t]*\n";
const ENV_CONFIGURE_BLOCK: &str = r"(?m)^[A-Za-z0-9_:.]+\.configure do[ \t]*\n";
const ROUTES_DRAW: &str = "routes.draw do\n";
const ERROR_PAGES: [&str; 3] = ["500", "404", "422"];
/// A line holding nothing but an HTML comment, removed with its newline.
const COMMENT_LINE: &str = r"(?m)^[ \t]*<!--.*-->[ \t]*\n";
/// A comment trailing other markup; the markup stays.
const TRAILING_COMMENT: &str = r"[ \t]*<!--.*?-->";

const UNPERMITTED_PARAMETERS: &str = "

  # Raise an ActionController::UnpermittedParameters exception when
  # a parameter is not explicitly permitted but is passed anyway.
  config.action_controller.action_on_unpermitted_parameters = :raise";

const GENERATORS: &str = "    config.generators do |generate|
      generate.decorator false
      generate.helper false
      generate.javascript_engine false
      generate.request_specs false
      generate.routing_specs true
      generate.stylesheets false
      generate.test_framework :rspec
      generate.view_specs false
      generate.fixture_replacement :machinist
    end

";

const OAUTH_FAKE_CREDENTIALS: &str = "  ENV['FACEBOOK_KEY']    = 'fake'
  ENV['FACEBOOK_SECRET'] = 'fake'
  ENV['GOOGLE_KEY']      = 'fake'
  ENV['GOOGLE_SECRET']   = 'fake'
  ENV['GITHUB_KEY']      = 'fake'
  ENV['GITHUB_SECRET']   = 'fake'
";

const OMNIAUTH_ROUTES: &str = "
  devise_for :users, controllers: {
    omniauth_callbacks: \"omniauth_callbacks\"
  }

  devise_scope :user do
    get 'sign_in', to: 'devise/sessions#new', as: :new_user_session
    get 'sign_out', to: 'devise/sessions#destroy', as: :destroy_user_session
  end
";

const RACK_DEFLATER: &str = "
  # Enable deflate / gzip compression of controller-generated responses
  config.middleware.use Rack::Deflater
";

const ERROR_PAGE_META: &str = "  <meta charset='utf-8' />
  <meta name='ROBOTS' content='NOODP' />
";

const USER_AUTH_FILES: [&str; 9] = [
    "db/migrate/20140522135601_devise_create_users.rb",
    "db/migrate/20140522142949_add_name_to_users.rb",
    "app/views/application/_login_button.html.erb",
    "app/views/application/_login_status.html.erb",
    "app/views/application/_login_links.html.erb",
    "app/controllers/omniauth_callbacks_controller.rb",
    "spec/controllers/omniauth_callbacks_controller_spec.rb",
    "app/models/user.rb",
    "spec/models/user_spec.rb",
];

const USER_AUTH_DIRS: [&str; 3] = ["app/models/oauth", "spec/models/oauth", "spec/support"];

const KEEP_DIRS: [&str; 6] = [
    "spec/lib",
    "spec/controllers",
    "spec/helpers",
    "spec/support/matchers",
    "spec/support/mixins",
    "spec/support/shared_examples",
];

/// Everything the catalog needs to know about the target application.
#[derive(Debug, Clone)]
pub struct CatalogInput {
    pub app_name: String,
    pub ruby_version: String,
    pub year: i32,
    pub hosts: BTreeMap<Environment, String>,
    pub secret_tokens: BTreeMap<Environment, String>,
    pub settings: Settings,
}

impl CatalogInput {
    /// Resolve hosts (settings, then config, then defaults) and mint fresh
    /// secret tokens for the test and development environments.
    pub fn new(app_name: &str, config: &PipelineConfig, settings: Settings) -> Self {
        let hosts = Environment::ALL
            .into_iter()
            .map(|env| {
                let host = settings
                    .host(env)
                    .map(str::to_string)
                    .or_else(|| config.hosts.get(&env).cloned())
                    .unwrap_or_else(|| default_host(env, app_name));
                (env, host)
            })
            .collect();
        let secret_tokens = [Environment::Test, Environment::Development]
            .into_iter()
            .map(|env| (env, generate_secret_token()))
            .collect();
        Self {
            app_name: app_name.to_string(),
            ruby_version: config.ruby_version.clone(),
            year: chrono::Local::now().year(),
            hosts,
            secret_tokens,
            settings,
        }
    }

    /// Bindings shared by every step.
    pub fn context(&self) -> Context {
        Context::new()
            .with("app_name", self.app_name.as_str())
            .with("app_class", app_class(&self.app_name))
            .with("ruby_version", self.ruby_version.as_str())
            .with("year", self.year.to_string())
            .merged(&self.settings.credentials_context())
    }

    fn per_environment(&self, key: &str, values: &BTreeMap<Environment, String>) -> EnvironmentContexts {
        values
            .iter()
            .map(|(env, value)| (*env, Context::new().with(key, value.as_str())))
            .collect()
    }
}

pub fn default_host(env: Environment, app_name: &str) -> String {
    match env {
        Environment::Development => format!("{app_name}.local"),
        Environment::Test => "www.example.com".to_string(),
        Environment::Staging => format!("staging.{app_name}.com"),
        Environment::Production => format!("{app_name}.com"),
    }
}

/// `my_shop` / `my-shop` -> `MyShop`.
pub fn app_class(app_name: &str) -> String {
    app_name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// 64 random url-safe characters.
pub fn generate_secret_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

fn rails_generate(generator: &str) -> ExternalAction {
    let mut args = vec!["exec", "rails", "generate"];
    args.extend(generator.split_whitespace());
    ExternalAction::new("bundle", args)
}

fn bundle_exec(args: &str) -> ExternalAction {
    let mut all = vec!["exec"];
    all.extend(args.split_whitespace());
    ExternalAction::new("bundle", all)
}

fn application_class() -> Result<Anchor> {
    Anchor::pattern(APPLICATION_CLASS)
}

fn route(text: &str) -> (Anchor, Fragment) {
    (Anchor::literal(ROUTES_DRAW), Fragment::inline(text))
}

/// The full, ordered baseline.
pub fn steps(input: &CatalogInput) -> Result<Vec<Step>> {
    let closing_end = || Anchor::literal("\nend").last();

    let (route_anchor, omniauth_routes) = route(OMNIAUTH_ROUTES);
    let (home_anchor, home_route) = route("  root to: 'high_voltage/pages#show', id: 'home'\n");

    let mut setup_user_auth = Step::new("setup_user_auth");
    for file in USER_AUTH_FILES {
        setup_user_auth = setup_user_auth.copy_forced(file, file);
    }
    for dir in USER_AUTH_DIRS {
        setup_user_auth = setup_user_auth.copy_dir(dir, dir);
    }
    setup_user_auth = setup_user_auth.inject_after(ROUTES_RB, route_anchor, omniauth_routes);

    let mut gitignore_files = Step::new("gitignore_files")
        .remove(".gitignore")
        .copy("gitignore", ".gitignore");
    for dir in KEEP_DIRS {
        gitignore_files = gitignore_files.create_dir_with_keep(dir);
    }

    let mut customize_error_pages = Step::new("customize_error_pages");
    for page in ERROR_PAGES {
        let path = format!("public/{page}.html");
        customize_error_pages = customize_error_pages
            .inject_after(&path, Anchor::literal("<head>\n"), Fragment::inline(ERROR_PAGE_META))
            .replace(&path, Replacement::pattern(COMMENT_LINE, "")?)
            .replace(&path, Replacement::pattern(TRAILING_COMMENT, "")?);
    }

    let steps = vec![
        Step::new("replace_gemfile")
            .remove("Gemfile")
            .render("Gemfile", "Gemfile"),
        Step::new("set_ruby_version").render_forced("ruby-version", ".ruby-version"),
        Step::new("readme")
            .render_forced("README.md", "README.md")
            .render_forced("MIT-LICENSE.md", "MIT-LICENSE.md"),
        Step::new("raise_on_delivery_errors").replace(
            DEVELOPMENT_RB,
            Replacement::literal("raise_delivery_errors = false", "raise_delivery_errors = true").required(),
        ),
        Step::new("raise_on_unpermitted_parameters").inject_before(
            DEVELOPMENT_RB,
            closing_end(),
            Fragment::inline(UNPERMITTED_PARAMETERS),
        ),
        Step::new("configure_generators").inject_after(
            APPLICATION_RB,
            application_class()?,
            Fragment::inline(GENERATORS),
        ),
        Step::new("configure_time_zone").inject_after(
            APPLICATION_RB,
            application_class()?,
            Fragment::inline("    config.active_record.default_timezone = :utc\n\n"),
        ),
        Step::new("fix_i18n_deprecation_warning").inject_after(
            APPLICATION_RB,
            application_class()?,
            Fragment::inline("    config.i18n.enforce_available_locales = true\n\n"),
        ),
        Step::new("remove_routes_comment_lines").replace(
            ROUTES_RB,
            Replacement::pattern(r"(?s)application\.routes\.draw do.*end", "application.routes.draw do\nend")?
                .required(),
        ),
        Step::new("setup_staging_environment")
            .copy("staging.rb", STAGING_RB)
            .append(
                STAGING_RB,
                Fragment::inline("\n{{ app_class }}::Application.configure do\n  # ...\nend\n"),
            ),
        Step::new("generate_rspec").invoke(rails_generate("rspec:install")),
        Step::new("configure_rspec")
            .remove("spec/spec_helper.rb")
            .copy("spec_helper.rb", "spec/spec_helper.rb"),
        Step::new("enable_database_cleaner")
            .copy("database_cleaner_rspec.rb", "spec/support/database_cleaner.rb"),
        Step::new("configure_spec_support_features")
            .create_dir_with_keep("spec/features")
            .create_dir_with_keep("spec/support/features"),
        Step::new("configure_i18n_in_specs").copy("i18n.rb", "spec/support/i18n.rb"),
        Step::new("generate_machinist").invoke(rails_generate("machinist:install")),
        Step::new("generate_devise")
            .invoke(rails_generate("devise:install"))
            .inject_before(DEVISE_INITIALIZER, closing_end(), Fragment::template("devise_omniauth.rb"))
            .across_environments(
                EnvironmentEdit::new(
                    Fragment::inline(OAUTH_FAKE_CREDENTIALS),
                    Placement::InjectAfter(Anchor::pattern(ENV_CONFIGURE_BLOCK)?),
                ),
                &Environment::ALL,
                EnvironmentContexts::new(),
            ),
        setup_user_auth,
        Step::new("generate_foundation").invoke(rails_generate("foundation:install -s")),
        Step::new("setup_smtp")
            .copy("smtp.yml", "config/smtp.yml")
            .copy("smtp_initializer.rb", "config/initializers/smtp_setup.rb"),
        Step::new("enable_rack_deflater").inject_after(
            PRODUCTION_RB,
            Anchor::literal("config.serve_static_assets = false\n"),
            Fragment::inline(RACK_DEFLATER),
        ),
        Step::new("setup_secret_token")
            .render_forced("secret_token.rb", "config/initializers/secret_token.rb")
            .across_environments(
                EnvironmentEdit::new(
                    Fragment::inline("  ENV['SECRET_KEY_BASE'] = '{{ secret_key_base }}'\n"),
                    Placement::InjectAfter(Anchor::pattern(ENV_CONFIGURE_BLOCK)?),
                ),
                &[Environment::Test, Environment::Development],
                input.per_environment("secret_key_base", &input.secret_tokens),
            ),
        Step::new("generate_home_page")
            .copy("home.html.erb", "app/views/pages/home.html.erb")
            .copy("home_routing_spec.rb", "spec/routing/home_routing_spec.rb")
            .inject_after(ROUTES_RB, home_anchor, home_route),
        Step::new("create_partials_directory").create_dir("app/views/application"),
        Step::new("create_shared_flashes")
            .copy("_flashes.html.erb", "app/views/application/_flashes.html.erb"),
        Step::new("create_shared_javascripts")
            .copy("_javascript.html.erb", "app/views/application/_javascript.html.erb"),
        Step::new("create_application_layout")
            .render_forced("application_layout.html.erb", "app/views/layouts/application.html.erb"),
        Step::new("remove_turbolinks").replace(
            "app/assets/javascripts/application.js",
            Replacement::pattern(r"//= require turbolinks\n", "")?,
        ),
        Step::new("configure_travis").render("travis.yml", ".travis.yml"),
        Step::new("configure_coveralls").copy("coveralls.yml", ".coveralls.yml"),
        Step::new("use_spring_binstubs").invoke(bundle_exec("spring binstub --all")),
        Step::new("configure_time_formats")
            .remove("config/locales/en.yml")
            .copy("config_locales_en.yml", "config/locales/en.yml"),
        Step::new("configure_action_mailer").across_environments(
            EnvironmentEdit::new(
                Fragment::inline("\n  config.action_mailer.default_url_options = { host: '{{ host }}' }"),
                Placement::InjectBefore(closing_end()),
            ),
            &Environment::ALL,
            input.per_environment("host", &input.hosts),
        ),
        Step::new("set_i18n")
            .copy_forced("devise.en.yml", "config/locales/devise.en.yml")
            .copy("devise.pt-BR.yml", "config/locales/devise.pt-BR.yml")
            .copy("pt-BR.yml", "config/locales/pt-BR.yml")
            .copy("system.pt-BR.yml", "config/locales/system.pt-BR.yml")
            .inject_after(
                APPLICATION_RB,
                application_class()?,
                Fragment::inline("    config.i18n.default_locale = 'pt-BR'\n\n"),
            ),
        Step::new("configure_unicorn").copy("unicorn.rb", "config/unicorn.rb"),
        Step::new("setup_stylesheets")
            .remove("app/assets/stylesheets/application.css")
            .copy("application.css.scss", "app/assets/stylesheets/application.css.scss"),
        gitignore_files,
        Step::new("copy_miscellaneous_files").copy("errors.rb", "config/initializers/errors.rb"),
        customize_error_pages,
        Step::new("disable_xml_params")
            .copy("disable_xml_params.rb", "config/initializers/disable_xml_params.rb"),
        Step::new("setup_default_rake_task").append(
            "Rakefile",
            Fragment::inline("task(:default).clear\ntask :default => [:spec]\n"),
        ),
        Step::new("init_git").invoke(ExternalAction::new("git", ["init"])),
        Step::new("create_database").invoke(bundle_exec("rake db:create db:migrate")),
    ];

    Ok(steps)
}
