/// Authorization for blog-service
///
/// Two independent checks guard every mutation:
///
/// - the permission gate: the actor holds the model permission for the action
/// - the ownership gate: the actor authored the resource or is an administrator
///
/// Both must pass. Reads are open to everyone, anonymous callers included.
use std::collections::HashSet;

use crate::error::{AppError, Result};
use crate::models::{Comment, Post, UserId};

/// Model permissions, named by Django-style codenames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    AddPost,
    ChangePost,
    DeletePost,
    AddComment,
    ChangeComment,
    DeleteComment,
    AddTag,
}

/// Granted to every account at registration.
pub const DEFAULT_USER_PERMISSIONS: &[Permission] = &[
    Permission::AddPost,
    Permission::ChangePost,
    Permission::DeletePost,
    Permission::AddComment,
    Permission::ChangeComment,
    Permission::DeleteComment,
    Permission::AddTag,
];

impl Permission {
    pub fn codename(&self) -> &'static str {
        match self {
            Permission::AddPost => "post.add_post",
            Permission::ChangePost => "post.change_post",
            Permission::DeletePost => "post.delete_post",
            Permission::AddComment => "post.add_comment",
            Permission::ChangeComment => "post.change_comment",
            Permission::DeleteComment => "post.delete_comment",
            Permission::AddTag => "post.add_tag",
        }
    }

    pub fn from_codename(codename: &str) -> Option<Self> {
        DEFAULT_USER_PERMISSIONS
            .iter()
            .copied()
            .find(|p| p.codename() == codename)
    }
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub username: String,
    pub is_superuser: bool,
    pub permissions: HashSet<Permission>,
}

impl Principal {
    /// Superusers implicitly hold every permission.
    pub fn has_perm(&self, permission: Permission) -> bool {
        self.is_superuser || self.permissions.contains(&permission)
    }
}

/// Caller of a request, as established by the identity middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    User(Principal),
}

impl Identity {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Identity::Anonymous => None,
            Identity::User(principal) => Some(principal),
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.principal().map(|p| p.id)
    }

    pub fn is_admin(&self) -> bool {
        self.principal().map(|p| p.is_superuser).unwrap_or(false)
    }
}

/// Ownership predicate: the actor may modify a resource owned by
/// `resource_owner` when they are that user or an administrator.
///
/// Anonymous actors never qualify, whatever `actor_is_admin` says.
pub fn can_modify(actor: &Identity, resource_owner: UserId, actor_is_admin: bool) -> bool {
    match actor {
        Identity::Anonymous => false,
        Identity::User(principal) => principal.id == resource_owner || actor_is_admin,
    }
}

/// Authenticated principal or `Unauthorized`.
pub fn require_authenticated(actor: &Identity) -> Result<&Principal> {
    actor
        .principal()
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
}

/// Permission gate.
pub fn require_permission(actor: &Identity, permission: Permission) -> Result<&Principal> {
    let principal = require_authenticated(actor)?;
    if principal.has_perm(permission) {
        Ok(principal)
    } else {
        Err(AppError::Forbidden(format!(
            "missing permission {}",
            permission.codename()
        )))
    }
}

pub fn require_admin(actor: &Identity) -> Result<&Principal> {
    let principal = require_authenticated(actor)?;
    if principal.is_superuser {
        Ok(principal)
    } else {
        Err(AppError::Forbidden(
            "Administrator privileges required".to_string(),
        ))
    }
}

/// Both gates for a post mutation (`ChangePost` or `DeletePost`).
pub fn check_post_modification(
    actor: &Identity,
    post: &Post,
    permission: Permission,
) -> Result<()> {
    require_permission(actor, permission)?;
    if can_modify(actor, post.author(), actor.is_admin()) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You don't have permission to modify this post".to_string(),
        ))
    }
}

/// Both gates for a comment mutation (`ChangeComment` or `DeleteComment`).
pub fn check_comment_modification(
    actor: &Identity,
    comment: &Comment,
    permission: Permission,
) -> Result<()> {
    require_permission(actor, permission)?;
    if can_modify(actor, comment.author(), actor.is_admin()) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You don't have permission to modify this comment".to_string(),
        ))
    }
}

/// A user may edit only their own profile; administrators may edit any.
pub fn check_profile_modification(actor: &Identity, profile_owner: UserId) -> Result<()> {
    require_authenticated(actor)?;
    if can_modify(actor, profile_owner, actor.is_admin()) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You can only edit your own profile".to_string(),
        ))
    }
}

/// Only the account holder may change a password; administrators included.
pub fn check_password_change(actor: &Identity, account_owner: UserId) -> Result<()> {
    require_authenticated(actor)?;
    if can_modify(actor, account_owner, false) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You can only change your own password".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(id: i64, is_superuser: bool, perms: &[Permission]) -> Identity {
        Identity::User(Principal {
            id: UserId(id),
            username: format!("user{}", id),
            is_superuser,
            permissions: perms.iter().copied().collect(),
        })
    }

    fn post_by(author: i64) -> Post {
        let now = Utc::now();
        Post {
            id: 1,
            title: "Hello".into(),
            slug: "hello".into(),
            body: Some("body".into()),
            author_id: author,
            author_username: None,
            category_id: None,
            category_title: None,
            category_slug: None,
            title_image: None,
            status: "published".into(),
            publish: now,
            created_at: now,
            updated_at: now,
            comment_count: None,
        }
    }

    fn comment_by(author: i64) -> Comment {
        let now = Utc::now();
        Comment {
            id: 3,
            post_id: 1,
            post_title: "Hello".into(),
            author_id: author,
            author_username: format!("user{}", author),
            body: "nice".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn owner_may_modify() {
        assert!(can_modify(&user(1, false, &[]), UserId(1), false));
    }

    #[test]
    fn stranger_may_not_modify() {
        assert!(!can_modify(&user(2, false, &[]), UserId(1), false));
    }

    #[test]
    fn admin_may_modify_anything() {
        assert!(can_modify(&user(2, true, &[]), UserId(1), true));
        assert!(can_modify(&user(1, true, &[]), UserId(1), true));
    }

    #[test]
    fn anonymous_never_qualifies() {
        assert!(!can_modify(&Identity::Anonymous, UserId(1), false));
        assert!(!can_modify(&Identity::Anonymous, UserId(1), true));
    }

    #[test]
    fn codenames_round_trip() {
        for perm in DEFAULT_USER_PERMISSIONS {
            assert_eq!(Permission::from_codename(perm.codename()), Some(*perm));
        }
        assert_eq!(Permission::from_codename("post.publish"), None);
    }

    #[test]
    fn post_mutation_needs_permission_and_ownership() {
        let post = post_by(1);

        // owner with permission
        assert!(check_post_modification(
            &user(1, false, DEFAULT_USER_PERMISSIONS),
            &post,
            Permission::ChangePost
        )
        .is_ok());

        // owner without permission
        assert!(matches!(
            check_post_modification(&user(1, false, &[]), &post, Permission::ChangePost),
            Err(AppError::Forbidden(_))
        ));

        // permission without ownership
        assert!(matches!(
            check_post_modification(
                &user(2, false, DEFAULT_USER_PERMISSIONS),
                &post,
                Permission::DeletePost
            ),
            Err(AppError::Forbidden(_))
        ));

        // superuser
        assert!(
            check_post_modification(&user(9, true, &[]), &post, Permission::DeletePost).is_ok()
        );

        // anonymous
        assert!(matches!(
            check_post_modification(&Identity::Anonymous, &post, Permission::ChangePost),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn comment_mutation_uses_comment_author() {
        let comment = comment_by(5);

        assert!(check_comment_modification(
            &user(5, false, DEFAULT_USER_PERMISSIONS),
            &comment,
            Permission::ChangeComment
        )
        .is_ok());
        assert!(matches!(
            check_comment_modification(
                &user(6, false, DEFAULT_USER_PERMISSIONS),
                &comment,
                Permission::DeleteComment
            ),
            Err(AppError::Forbidden(_))
        ));
        assert!(check_comment_modification(
            &user(7, true, &[]),
            &comment,
            Permission::DeleteComment
        )
        .is_ok());
    }

    #[test]
    fn admin_only_actions() {
        assert!(require_admin(&user(1, true, &[])).is_ok());
        assert!(matches!(
            require_admin(&user(1, false, DEFAULT_USER_PERMISSIONS)),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            require_admin(&Identity::Anonymous),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn profile_edit_is_self_or_admin() {
        assert!(check_profile_modification(&user(3, false, &[]), UserId(3)).is_ok());
        assert!(check_profile_modification(&user(4, false, &[]), UserId(3)).is_err());
        assert!(check_profile_modification(&user(4, true, &[]), UserId(3)).is_ok());
    }

    #[test]
    fn password_change_is_self_only() {
        assert!(check_password_change(&user(3, false, &[]), UserId(3)).is_ok());
        assert!(matches!(
            check_password_change(&user(4, true, &[]), UserId(3)),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            check_password_change(&Identity::Anonymous, UserId(3)),
            Err(AppError::Unauthorized(_))
        ));
    }
}
