//! # Page views
//!
//! Each page issues a handful of plain reads and joins them here in memory. Counts are
//! computed by filtering the fetched rows; nothing is aggregated in SQL and nothing is cached.

use std::collections::{HashMap, HashSet};

use rusqlite::Connection;
use serde::Serialize;

use crate::{
    database::{comments, posts, profiles, schools, user_schools, votes},
    error::AppError,
    models::{Post, PostType, Profile, School, SchoolStatus, UserSchool, Vote, VoteType},
    policy::Caller,
};

pub const HOME_SCHOOLS: usize = 20;
pub const HOME_RECENT_POSTS: usize = 10;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PostCounts {
    pub pro: usize,
    pub con: usize,
    pub general: usize,
    pub total: usize,
}

impl PostCounts {
    pub fn of<'a>(posts: impl IntoIterator<Item = &'a Post>) -> Self {
        posts.into_iter().fold(Self::default(), |mut counts, post| {
            match post.post_type {
                PostType::Pro => counts.pro += 1,
                PostType::Con => counts.con += 1,
                PostType::General => counts.general += 1,
            }
            counts.total += 1;
            counts
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PostCard {
    #[serde(flatten)]
    pub post: Post,
    pub author: Option<String>,
    pub school_name: Option<String>,
    pub upvotes: usize,
    pub downvotes: usize,
    pub comment_count: usize,
    pub my_vote: Option<VoteType>,
}

#[derive(Debug, Serialize)]
pub struct SchoolLink {
    #[serde(flatten)]
    pub link: UserSchool,
    pub school: Option<School>,
}

#[derive(Debug, Serialize)]
pub struct HomeView {
    pub schools: Vec<School>,
    pub recent_posts: Vec<PostCard>,
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub profile: Profile,
    pub is_own: bool,
    pub current_schools: Vec<SchoolLink>,
    pub past_schools: Vec<SchoolLink>,
    pub post_counts: PostCounts,
    pub posts: Vec<PostCard>,
}

#[derive(Debug, Serialize)]
pub struct SchoolView {
    pub school: School,
    pub post_counts: PostCounts,
    pub selected_type: Option<PostType>,
    pub posts: Vec<PostCard>,
    pub current_members: usize,
    pub past_members: usize,
    pub my_statuses: Vec<SchoolStatus>,
}

#[derive(Debug, Serialize)]
pub struct CreatePostView {
    pub schools: Vec<School>,
    pub my_schools: Vec<SchoolLink>,
    pub post_types: &'static [PostType],
}

fn unique<'a>(ids: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    ids.into_iter()
        .collect::<HashSet<_>>()
        .into_iter()
        .cloned()
        .collect()
}

/// Joins authors, schools, votes and comments onto `posts`, preserving their order.
pub fn post_cards(
    conn: &Connection,
    viewer: &Caller,
    posts: Vec<Post>,
) -> Result<Vec<PostCard>, AppError> {
    let post_ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();
    let authors = profiles::by_ids(conn, &unique(posts.iter().map(|p| &p.user_id)))?;
    let schools = schools::by_ids(conn, &unique(posts.iter().map(|p| &p.school_id)))?;
    let votes = votes::list_for_posts(conn, &post_ids)?;
    let comments = comments::list_for_posts(conn, &post_ids)?;

    let mut comment_counts: HashMap<&str, usize> = HashMap::new();
    for comment in &comments {
        *comment_counts.entry(comment.post_id.as_str()).or_default() += 1;
    }

    let mut votes_by_post: HashMap<&str, Vec<&Vote>> = HashMap::new();
    for vote in &votes {
        votes_by_post.entry(vote.post_id.as_str()).or_default().push(vote);
    }

    let cards = posts
        .into_iter()
        .map(|post| {
            let post_votes = votes_by_post
                .get(post.id.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default()
                .iter();

            PostCard {
                author: authors.get(&post.user_id).map(|p| p.username.clone()),
                school_name: schools.get(&post.school_id).map(|s| s.name.clone()),
                upvotes: post_votes
                    .clone()
                    .filter(|v| v.vote_type == VoteType::Upvote)
                    .count(),
                downvotes: post_votes
                    .clone()
                    .filter(|v| v.vote_type == VoteType::Downvote)
                    .count(),
                comment_count: comment_counts.get(post.id.as_str()).copied().unwrap_or(0),
                my_vote: post_votes
                    .clone()
                    .find(|v| Some(v.user_id.as_str()) == viewer.user_id())
                    .map(|v| v.vote_type),
                post,
            }
        })
        .collect();

    Ok(cards)
}

fn school_links(conn: &Connection, links: Vec<UserSchool>) -> Result<Vec<SchoolLink>, AppError> {
    let schools = schools::by_ids(conn, &unique(links.iter().map(|l| &l.school_id)))?;

    Ok(links
        .into_iter()
        .map(|link| SchoolLink {
            school: schools.get(&link.school_id).cloned(),
            link,
        })
        .collect())
}

pub fn home(conn: &Connection, viewer: &Caller) -> Result<HomeView, AppError> {
    let schools = schools::list(conn, Some(HOME_SCHOOLS))?;
    let recent = posts::list(
        conn,
        &posts::PostFilter {
            limit: Some(HOME_RECENT_POSTS),
            ..Default::default()
        },
    )?;

    Ok(HomeView {
        schools,
        recent_posts: post_cards(conn, viewer, recent)?,
    })
}

pub fn profile(conn: &Connection, viewer: &Caller, id: &str) -> Result<ProfileView, AppError> {
    let profile = profiles::get(conn, id)?;
    let links = school_links(conn, user_schools::list_for_user(conn, id)?)?;
    let posts = posts::list(
        conn,
        &posts::PostFilter {
            user_id: Some(id.to_string()),
            ..Default::default()
        },
    )?;

    let (current_schools, past_schools): (Vec<_>, Vec<_>) = links
        .into_iter()
        .partition(|l| l.link.status == SchoolStatus::Current);

    Ok(ProfileView {
        is_own: viewer.user_id() == Some(id),
        post_counts: PostCounts::of(&posts),
        posts: post_cards(conn, viewer, posts)?,
        profile,
        current_schools,
        past_schools,
    })
}

pub fn school(
    conn: &Connection,
    viewer: &Caller,
    id: &str,
    selected_type: Option<PostType>,
) -> Result<SchoolView, AppError> {
    let school = schools::get(conn, id)?;
    let all_posts = posts::list(
        conn,
        &posts::PostFilter {
            school_id: Some(id.to_string()),
            ..Default::default()
        },
    )?;
    let members = user_schools::list_for_school(conn, id)?;

    let post_counts = PostCounts::of(&all_posts);
    let shown = all_posts
        .into_iter()
        .filter(|p| selected_type.is_none_or(|t| p.post_type == t))
        .collect();

    Ok(SchoolView {
        school,
        post_counts,
        selected_type,
        posts: post_cards(conn, viewer, shown)?,
        current_members: members
            .iter()
            .filter(|m| m.status == SchoolStatus::Current)
            .count(),
        past_members: members
            .iter()
            .filter(|m| m.status == SchoolStatus::Past)
            .count(),
        my_statuses: members
            .iter()
            .filter(|m| Some(m.user_id.as_str()) == viewer.user_id())
            .map(|m| m.status)
            .collect(),
    })
}

pub fn create_post(conn: &Connection, viewer: &Caller) -> Result<CreatePostView, AppError> {
    let user_id = viewer.require_user()?;

    Ok(CreatePostView {
        schools: schools::list(conn, None)?,
        my_schools: school_links(conn, user_schools::list_for_user(conn, user_id)?)?,
        post_types: PostType::ALL,
    })
}

#[cfg(test)]
mod tests {
    use super::{school as school_view, *};
    use crate::database::{
        test_support::{db, post, school, user},
        user_schools::NewUserSchool,
    };

    #[test]
    fn test_post_counts() {
        let db = db();

        db.with_conn(|conn| {
            let alice = user(conn, "alice");
            let lincoln = school(conn, &alice, "Lincoln High");
            let posts = vec![
                post(conn, &alice, &lincoln, PostType::Pro),
                post(conn, &alice, &lincoln, PostType::Con),
                post(conn, &alice, &lincoln, PostType::Con),
            ];

            assert_eq!(
                PostCounts::of(&posts),
                PostCounts {
                    pro: 1,
                    con: 2,
                    general: 0,
                    total: 3
                }
            );
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_cards_tally_votes_and_comments() {
        let db = db();

        db.with_conn(|conn| {
            let alice = user(conn, "alice");
            let bob = user(conn, "bob");
            let carol = user(conn, "carol");
            let lincoln = school(conn, &alice, "Lincoln High");
            let review = post(conn, &alice, &lincoln, PostType::Pro);

            votes::cast(conn, &bob, &review.id, VoteType::Upvote)?;
            votes::cast(conn, &carol, &review.id, VoteType::Downvote)?;
            votes::cast(conn, &alice, &review.id, VoteType::Upvote)?;
            comments::insert(conn, &bob, comments::NewComment {
                post_id: review.id.clone(),
                user_id: bob.user_id().unwrap().to_string(),
                content: "Agreed".to_string(),
            })?;

            let cards = post_cards(conn, &carol, vec![review])?;
            let card = &cards[0];

            assert_eq!(card.author.as_deref(), Some("alice"));
            assert_eq!(card.school_name.as_deref(), Some("Lincoln High"));
            assert_eq!((card.upvotes, card.downvotes), (2, 1));
            assert_eq!(card.comment_count, 1);
            assert_eq!(card.my_vote, Some(VoteType::Downvote));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_cards_keep_votes_with_their_post() {
        let db = db();

        db.with_conn(|conn| {
            let alice = user(conn, "alice");
            let bob = user(conn, "bob");
            let lincoln = school(conn, &alice, "Lincoln High");
            let first = post(conn, &alice, &lincoln, PostType::Pro);
            let second = post(conn, &alice, &lincoln, PostType::Con);
            let quiet = post(conn, &alice, &lincoln, PostType::General);

            votes::cast(conn, &bob, &first.id, VoteType::Upvote)?;
            votes::cast(conn, &alice, &first.id, VoteType::Upvote)?;
            votes::cast(conn, &bob, &second.id, VoteType::Downvote)?;

            let cards = post_cards(conn, &bob, vec![first, second, quiet])?;
            let tallies: Vec<_> = cards
                .iter()
                .map(|c| (c.upvotes, c.downvotes, c.my_vote))
                .collect();

            assert_eq!(
                tallies,
                vec![
                    (2, 0, Some(VoteType::Upvote)),
                    (0, 1, Some(VoteType::Downvote)),
                    (0, 0, None),
                ]
            );
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_home_limits() {
        let db = db();

        db.with_conn(|conn| {
            let alice = user(conn, "alice");
            let mut last = None;
            for i in 0..(HOME_SCHOOLS + 2) {
                let s = school(conn, &alice, &format!("School {i:02}"));
                last = Some(post(conn, &alice, &s, PostType::General));
            }

            let view = home(conn, &alice)?;

            assert_eq!(view.schools.len(), HOME_SCHOOLS);
            assert_eq!(view.recent_posts.len(), HOME_RECENT_POSTS);
            assert_eq!(view.recent_posts[0].post.id, last.unwrap().id);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_profile_splits_current_and_past() {
        let db = db();

        db.with_conn(|conn| {
            let alice = user(conn, "alice");
            let bob = user(conn, "bob");
            let lincoln = school(conn, &alice, "Lincoln High");
            let roosevelt = school(conn, &alice, "Roosevelt");
            let alice_id = alice.user_id().unwrap().to_string();

            for (school_id, status) in [
                (&lincoln.id, SchoolStatus::Past),
                (&roosevelt.id, SchoolStatus::Current),
            ] {
                user_schools::insert(conn, &alice, NewUserSchool {
                    user_id: alice_id.clone(),
                    school_id: school_id.clone(),
                    status,
                })?;
            }
            post(conn, &alice, &lincoln, PostType::Con);

            let own = profile(conn, &alice, &alice_id)?;
            let other = profile(conn, &bob, &alice_id)?;

            assert!(own.is_own);
            assert!(!other.is_own);
            assert_eq!(own.current_schools.len(), 1);
            assert_eq!(
                own.current_schools[0].school.as_ref().map(|s| s.name.as_str()),
                Some("Roosevelt")
            );
            assert_eq!(own.past_schools[0].link.school_id, lincoln.id);
            assert_eq!(own.post_counts.con, 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_school_filters_by_type_but_counts_all() {
        let db = db();

        db.with_conn(|conn| {
            let alice = user(conn, "alice");
            let bob = user(conn, "bob");
            let lincoln = school(conn, &alice, "Lincoln High");
            post(conn, &alice, &lincoln, PostType::Pro);
            post(conn, &bob, &lincoln, PostType::Con);
            post(conn, &bob, &lincoln, PostType::General);
            user_schools::insert(conn, &bob, NewUserSchool {
                user_id: bob.user_id().unwrap().to_string(),
                school_id: lincoln.id.clone(),
                status: SchoolStatus::Current,
            })?;

            let view = school_view(conn, &bob, &lincoln.id, Some(PostType::Con))?;

            assert_eq!(view.post_counts.total, 3);
            assert_eq!(view.posts.len(), 1);
            assert_eq!(view.posts[0].post.post_type, PostType::Con);
            assert_eq!((view.current_members, view.past_members), (1, 0));
            assert_eq!(view.my_statuses, [SchoolStatus::Current]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_missing_school_is_not_found() {
        let db = db();

        let result = db.with_conn(|conn| school_view(conn, &Caller::Anonymous, "missing", None));

        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[test]
    fn test_create_post_lists_all_schools() {
        let db = db();

        db.with_conn(|conn| {
            let alice = user(conn, "alice");
            school(conn, &alice, "Lincoln High");
            school(conn, &alice, "Roosevelt");

            let view = create_post(conn, &alice)?;

            assert_eq!(view.schools.len(), 2);
            assert!(view.my_schools.is_empty());
            assert_eq!(view.post_types, PostType::ALL);
            Ok(())
        })
        .unwrap();
    }
}
