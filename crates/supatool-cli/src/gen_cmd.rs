use crate::cli::{CreateArgs, GenArgs};
use crate::write::{apply_generated_files, write_atomic};
use supatool_schema::{Model, generate::generate};

pub const DEFAULT_MODEL_PATH: &str = "docs/model-schema-example.yaml";
pub const DEFAULT_TEMPLATE: &str = "example";

const EXAMPLE_MODEL: &str = r#"# supatool model. Generate with:
#   supatool gen all docs/model-schema-example.yaml
#   supatool gen sql docs/model-schema-example.yaml
models:
  - tables:
      users:
        description: Supabase auth users (built in, never created)
        skipCreate: true
        fields:
          id: { type: uuid, primary: true, label: User ID }
          email: { type: text, label: Email }
      user_profiles:
        description: Public profile for each user
        fields:
          id: { type: uuid, primary: true, notNull: true, default: gen_random_uuid(), label: ID }
          user_id: { type: uuid, notNull: true, unique: true, ref: users.id, label: User }
          display_name: { type: text, notNull: true, label: Display name }
          bio: { type: text, label: Bio }
          created_at: { type: timestamptz, notNull: true, default: now(), label: Created at }
        relations:
          user: { type: belongsTo, target: users, foreignKey: user_id }
      posts:
        description: Posts written by users
        fields:
          id: { type: uuid, primary: true, notNull: true, default: gen_random_uuid(), label: ID }
          author_id: { type: uuid, notNull: true, ref: user_profiles.id, label: Author }
          title: { type: text, notNull: true, label: Title }
          body: { type: text, label: Body }
          published: { type: boolean, notNull: true, default: false, label: Published }
          created_at: { type: timestamptz, notNull: true, default: now(), label: Created at }
        relations:
          author: { type: belongsTo, target: user_profiles, foreignKey: author_id }

roles: [admin, member]

security:
  functions:
    current_user_role:
      template_type: simple
  policies:
    posts:
      select:
        role: [admin, member]
      insert:
        role: [member]
      delete:
        using: auth.uid() = author_id
"#;

pub fn run(args: GenArgs) -> anyhow::Result<()> {
    let model = Model::load(&args.model)?;
    let out = args.out.unwrap_or_else(|| args.kind.default_output());
    let files = generate(args.kind, &model, &out);
    let summary = apply_generated_files(&files)?;
    tracing::debug!(written = summary.written.len(), unchanged = summary.unchanged.len(), "gen finished");
    Ok(())
}

/// Starter model for `template`.
pub fn template(name: &str) -> Option<&'static str> {
    match name {
        DEFAULT_TEMPLATE => Some(EXAMPLE_MODEL),
        _ => None,
    }
}

pub fn create(args: CreateArgs) -> anyhow::Result<()> {
    let Some(content) = template(&args.template) else {
        anyhow::bail!("unknown template: {} (available: {DEFAULT_TEMPLATE})", args.template);
    };
    if args.out.exists() {
        anyhow::bail!("refusing to overwrite existing file: {}", args.out.display());
    }
    write_atomic(&args.out, content)?;
    println!("wrote {}", args.out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};
    use supatool_schema::GenKind;

    fn make_temp_dir() -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("supatool-gen-{nonce}"));
        std::fs::create_dir_all(&dir).expect("mkdir");
        dir
    }

    #[test]
    fn example_model_parses() {
        let model = Model::from_yaml_str(EXAMPLE_MODEL).unwrap();
        let created: Vec<&str> = model.created_tables().map(|(n, _)| n).collect();
        assert_eq!(created, ["user_profiles", "posts"]);
        assert_eq!(model.roles, ["admin", "member"]);
    }

    #[test]
    fn create_then_gen_all() {
        let dir = make_temp_dir();
        let model_path = dir.join("model.yaml");
        create(CreateArgs {
            template: DEFAULT_TEMPLATE.to_string(),
            out: model_path.clone(),
        })
        .unwrap();
        assert!(
            create(CreateArgs {
                template: DEFAULT_TEMPLATE.to_string(),
                out: model_path.clone(),
            })
            .is_err()
        );

        run(GenArgs {
            kind: GenKind::All,
            model: model_path,
            out: Some(dir.join("generated")),
        })
        .unwrap();
        assert!(dir.join("generated/types.ts").is_file());
        assert!(dir.join("generated/table-doc.md").is_file());
        assert!(dir.join("generated/relations.md").is_file());
        assert!(dir.join("generated/crud").is_dir());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unknown_template_is_rejected() {
        let dir = make_temp_dir();
        let err = create(CreateArgs {
            template: "blog".into(),
            out: dir.join("x.yaml"),
        })
        .unwrap_err();
        assert!(err.to_string().contains("unknown template"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
